//! Manual retention sweep
//!
//! Runs the same sweep the server schedules, logged under the same call name.

use anyhow::Result;
use colored::Colorize;
use log_viewer::config::Config;
use log_viewer::observability::{CallRunner, Clock, RetentionSweeper, SystemClock};
use std::sync::Arc;

use super::{format_number, open_store};

/// Execute the sweep command
pub async fn execute(cfg: &Config) -> Result<()> {
    println!("{}", "Running retention sweep...".bold());
    println!();

    let store = open_store(cfg).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let runner = CallRunner::new(store.clone(), clock.clone());
    let sweeper = RetentionSweeper::new(runner, store, clock);

    let report = sweeper.sweep_now().await?;

    println!("{}", "Sweep Results:".green().bold());
    println!(
        "{:<30} {:>15}",
        "  Cutoff:",
        report.cutoff.format("%Y-%m-%d %H:%M:%S").to_string()
    );
    println!(
        "{:<30} {:>15}",
        "  Size Before Cleanup:",
        format!("{}KB", format_number(report.disk_size_before_cleanup_kb))
    );
    println!("{:<30} {:>15}", "  Calls Removed:", format_number(report.removed_count));
    println!();

    if report.removed_count == 0 {
        println!("{}", "No old calls to delete (all data within retention period)".dimmed());
    }

    Ok(())
}
