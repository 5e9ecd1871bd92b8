//! Logs query command
//!
//! Show one page of an endpoint's stored calls, the same page the HTTP API
//! would return.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use colored::Colorize;
use log_viewer::config::Config;
use log_viewer::observability::{Day, LogEvent, LogLine, QueryService, Severity};

use super::open_store;

/// Query and display stored calls
#[derive(Debug, Clone, Parser)]
pub struct LogsArgs {
    /// Endpoint name (see `endpoints`)
    #[arg(short, long)]
    pub endpoint: String,

    /// UTC day as YYYY-MM-DD (default: today)
    #[arg(short, long)]
    pub day: Option<String>,

    /// Zero-based page index
    #[arg(short, long, default_value = "0")]
    pub page: usize,

    /// Output format (text, json)
    #[arg(short = 'f', long, default_value = "text")]
    pub format: String,
}

/// Execute the logs command
pub async fn execute(cfg: &Config, args: LogsArgs) -> Result<()> {
    let day = parse_day(args.day.as_deref())?;
    let store = open_store(cfg).await?;

    let response = QueryService::new(store)
        .query(&args.endpoint, day, args.page)
        .await?;

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        _ => {
            if response.logs.is_empty() {
                println!("{}", "No calls found matching the criteria".yellow());
                return Ok(());
            }

            println!(
                "{}",
                format!(
                    "{} on {:04}-{:02}-{:02}, page {} of {}",
                    args.endpoint,
                    day.year,
                    day.month,
                    day.day,
                    args.page + 1,
                    response.page_count
                )
                .bold()
            );
            println!();
            for event in &response.logs {
                display_event(event);
            }
        }
    }

    Ok(())
}

fn parse_day(day: Option<&str>) -> Result<Day> {
    let date = match day {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid day '{}', expected YYYY-MM-DD", s))?,
        None => Utc::now().date_naive(),
    };
    Ok(Day::from_date(date))
}

/// Display one call in human-friendly text format
fn display_event(event: &LogEvent) {
    let started = event.start_time.format("%H:%M:%S%.3f").to_string();
    let header = format!("{} {} ({} ms)", started, event.name, event.duration_ms());
    if event.logs.iter().any(LogLine::is_error) {
        println!("{}", header.red().bold());
    } else {
        println!("{}", header.bold());
    }

    for line in &event.logs {
        match line {
            LogLine::Message { text, time, severity } => {
                let level = match severity {
                    Severity::Error => severity.as_str().red().bold(),
                    Severity::Warn => severity.as_str().yellow().bold(),
                    Severity::Info => severity.as_str().green(),
                };
                println!(
                    "  {} {} {}",
                    time.format("%H:%M:%S%.3f").to_string().dimmed(),
                    level,
                    text
                );
            }
            LogLine::Detail { key, value } => {
                println!("  {} = {}", key.cyan(), value);
            }
            LogLine::Error {
                message,
                time,
                exception_message,
                stacktrace,
            } => {
                println!(
                    "  {} {} {}: {}",
                    time.format("%H:%M:%S%.3f").to_string().dimmed(),
                    "ERROR".red().bold(),
                    message,
                    exception_message
                );
                for frame in stacktrace.lines() {
                    println!("    {}", frame.dimmed());
                }
            }
        }
    }
    println!();
}
