//! SQLite store for call log events
//!
//! This module provides async database operations with:
//! - Connection pooling
//! - Automatic migrations
//! - WAL mode for concurrent reads/writes
//!
//! One row per [`LogEvent`]; the ordered log lines are kept as a JSON array
//! in the `logs` column. Rows are only ever inserted and bulk-deleted.

use crate::observability::event::{LogEvent, LogLine};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Storage failures
///
/// These are never retried here; callers propagate them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to run log store migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("failed to encode or decode log lines: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}

/// Log event database handle
///
/// Manages the SQLite connection pool. SQLite serializes writers itself,
/// so concurrent `put`s from many calls need no extra locking here.
pub struct LogStore {
    pool: SqlitePool,
}

impl LogStore {
    /// Open (or create) the database file at `path`
    ///
    /// Missing parent directories are created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new().filename(path);
        Self::with_options(options, 5).await
    }

    /// Connect with a database URL (e.g., "sqlite:./data/logs.db")
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?;
        Self::with_options(options, 5).await
    }

    /// Private in-memory database
    ///
    /// The pool is pinned to a single connection that never expires, since
    /// every SQLite connection to `:memory:` sees its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    async fn with_options(options: SqliteConnectOptions, max_connections: u32) -> Result<Self, StoreError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal) // Write-Ahead Logging for concurrency
            .busy_timeout(Duration::from_secs(30)) // Wait up to 30s for locks
            .pragma("synchronous", "NORMAL");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(pool).await?;

        tracing::debug!("Log store migrations completed");
        Ok(())
    }

    /// Insert one event and return its assigned id
    ///
    /// The insert is committed before this returns.
    pub async fn put(&self, event: &LogEvent) -> Result<i64, StoreError> {
        let logs = serde_json::to_string(&event.logs)?;

        let result = sqlx::query(
            "INSERT INTO log_events (name, start_time, end_time, logs)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&event.name)
        .bind(event.start_time.timestamp_millis())
        .bind(event.end_time.timestamp_millis())
        .bind(&logs)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Every endpoint name with at least one stored event, ascending
    pub async fn distinct_names(&self) -> Result<Vec<String>, StoreError> {
        let names: Vec<String> = sqlx::query_scalar("SELECT DISTINCT name FROM log_events ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(names)
    }

    /// Events named `name` whose start time lies in `[from_ms, to_ms]`
    ///
    /// Rows come back in insertion (id) order; callers sort.
    pub async fn find(&self, name: &str, from_ms: i64, to_ms: i64) -> Result<Vec<LogEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT name, start_time, end_time, logs
             FROM log_events
             WHERE name = ? AND start_time BETWEEN ? AND ?
             ORDER BY id ASC",
        )
        .bind(name)
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<LogEvent, StoreError> {
                let logs: String = row.get("logs");
                Ok(LogEvent {
                    name: row.get("name"),
                    start_time: from_millis(row.get("start_time"))?,
                    end_time: from_millis(row.get("end_time"))?,
                    logs: serde_json::from_str::<Vec<LogLine>>(&logs)?,
                })
            })
            .collect()
    }

    /// Delete every event that started strictly before `cutoff_ms`
    ///
    /// Returns the number of rows removed.
    pub async fn delete_started_before(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM log_events WHERE start_time < ?")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Total number of stored events
    pub async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM log_events")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    /// Approximate database size in bytes (`page_count * page_size`)
    pub async fn size_on_disk(&self) -> Result<u64, StoreError> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;

        Ok((page_count.max(0) as u64) * (page_size.max(0) as u64))
    }

    /// Get the underlying connection pool (for advanced usage)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms).ok_or(StoreError::InvalidTimestamp(ms))
}
