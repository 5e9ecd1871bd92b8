//! Command implementations for the CLI
//!
//! This module contains the implementation of all CLI commands:
//! - start: Start the log viewer server
//! - endpoints: List stored endpoint names
//! - logs: Show a page of stored calls
//! - sweep: Run the retention sweep now
//! - config: Configuration display and validation

pub mod config;
pub mod endpoints;
pub mod logs;
pub mod start;
pub mod sweep;

use anyhow::Result;
use log_viewer::config::Config;
use log_viewer::observability::LogStore;
use std::sync::Arc;

/// Open the configured log store
pub async fn open_store(cfg: &Config) -> Result<Arc<LogStore>> {
    let store = LogStore::open(&cfg.storage.database_path).await?;
    Ok(Arc::new(store))
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
