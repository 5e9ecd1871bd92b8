//! Background retention sweep for call logs
//!
//! Deletes events older than one calendar month. The sweep runs once at
//! start and then every 24 hours, and goes through [`CallRunner`] itself so
//! each sweep shows up as a `logViewer_cleanup` event.

use super::clock::Clock;
use super::database::{LogStore, StoreError};
use super::runner::CallRunner;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;

/// Call name the sweep is logged under
pub const CLEANUP_CALL_NAME: &str = "logViewer_cleanup";

/// Events older than this many calendar months are removed
pub const RETENTION_MONTHS: u32 = 1;

/// Time between sweeps
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Result of one sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Database size before deleting, in KB (bytes / 1000)
    pub disk_size_before_cleanup_kb: u64,
    pub removed_count: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub cutoff: DateTime<Utc>,
}

/// Cutoff for a sweep at `now`: one calendar month earlier
///
/// Month arithmetic clamps to the last day of the shorter month
/// (March 31st sweeps cut at February 28th/29th).
pub fn retention_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(RETENTION_MONTHS))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Periodic deletion of old call logs
pub struct RetentionSweeper {
    runner: CallRunner,
    store: Arc<LogStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(runner: CallRunner, store: Arc<LogStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            runner,
            store,
            clock,
            interval: SWEEP_INTERVAL,
        }
    }

    /// Override the time between sweeps
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one sweep now
    ///
    /// The sweep logs `Time`, `Log Size` and `Logs Removed` into its own
    /// call record.
    pub async fn sweep_now(&self) -> Result<SweepReport, StoreError> {
        let store = self.store.clone();
        let now = self.clock.now();

        self.runner
            .run(CLEANUP_CALL_NAME, |ctx| async move {
                ctx.log_data("Time", || now.to_rfc3339());

                let cutoff = retention_cutoff(now);
                let size_kb = store.size_on_disk().await? / 1000;
                ctx.log_data("Log Size", || format!("{}KB", size_kb));

                let removed = store.delete_started_before(cutoff.timestamp_millis()).await?;
                ctx.log_data("Logs Removed", || removed);

                Ok::<_, StoreError>(SweepReport {
                    disk_size_before_cleanup_kb: size_kb,
                    removed_count: removed,
                    cutoff,
                })
            })
            .await
    }

    /// Spawn the background loop
    ///
    /// The first sweep happens right away. Use the returned handle to stop
    /// the loop.
    pub fn start(self: Arc<Self>) -> SweeperHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            self.sweep_loop(stop_rx).await;
        });

        SweeperHandle {
            stop_tx: Some(stop_tx),
            task,
        }
    }

    async fn sweep_loop(&self, mut stop_rx: oneshot::Receiver<()>) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            retention_months = RETENTION_MONTHS,
            "Retention sweeper started"
        );

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = interval.tick() => {
                    match self.sweep_now().await {
                        Ok(report) => {
                            crate::metrics::record_sweep(report.removed_count, report.disk_size_before_cleanup_kb);
                            tracing::info!(
                                removed = report.removed_count,
                                size_kb = report.disk_size_before_cleanup_kb,
                                cutoff = %report.cutoff,
                                "Retention sweep completed"
                            );
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                "Retention sweep failed"
                            );
                        }
                    }
                }
            }
        }

        tracing::info!("Retention sweeper stopped");
    }
}

/// Handle to a running sweeper loop
///
/// Dropping the handle also ends the loop after the current sweep.
pub struct SweeperHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the loop and wait for it to exit
    ///
    /// A sweep already in progress finishes first.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "Retention sweeper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
