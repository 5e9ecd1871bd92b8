use anyhow::Result;
use colored::Colorize;
use log_viewer::config::Config;
use log_viewer::observability::QueryService;

use super::{format_number, open_store};

/// Execute the endpoints command
pub async fn execute(cfg: &Config) -> Result<()> {
    let store = open_store(cfg).await?;
    let total = store.count().await?;
    let endpoints = QueryService::new(store).list_endpoints().await?;

    if endpoints.is_empty() {
        println!("{}", "No calls stored yet".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("{} endpoints, {} stored calls", endpoints.len(), format_number(total)).bold()
    );
    println!();
    for endpoint in endpoints {
        println!("  {}", endpoint.cyan());
    }

    Ok(())
}
