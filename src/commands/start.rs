use anyhow::Result;
use colored::Colorize;
use log_viewer::{config::Config, server};
use tracing::info;

/// Execute the start command
///
/// Runs the server in the foreground until SIGINT/SIGTERM.
pub async fn execute(cfg: Config) -> Result<()> {
    println!("{}", "Starting log viewer...".green());
    info!(
        database = %cfg.storage.database_path,
        "Starting log viewer in foreground mode"
    );

    // Start the server (blocks until shutdown)
    server::start_server(cfg).await?;

    Ok(())
}
