use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use log_viewer::{config, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = cli::Cli::parse();

    let cfg = config::load_config(&args.config)?;

    // Initialize tracing/logging with the configured level and format
    init_tracing(&cfg.server.log_level, &cfg.server.log_format);

    // Dispatch to appropriate command handler
    match args.get_command() {
        cli::Commands::Start => {
            commands::start::execute(cfg).await?;
        }
        cli::Commands::Endpoints => {
            commands::endpoints::execute(&cfg).await?;
        }
        cli::Commands::Logs(logs_args) => {
            commands::logs::execute(&cfg, logs_args).await?;
        }
        cli::Commands::Sweep => {
            commands::sweep::execute(&cfg).await?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&cfg)?,
            cli::ConfigCommands::Validate => commands::config::validate(&cfg, &args.config),
        },
        cli::Commands::Version => {
            println!("Log Viewer v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
