use anyhow::Result;
use colored::Colorize;
use log_viewer::config::Config;
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the effective configuration with the password masked
pub fn show(cfg: &Config) -> Result<()> {
    let sanitized = sanitize_secrets(cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    // Serialize to TOML format
    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    info!("Configuration displayed successfully");
    Ok(())
}

/// Execute the config validate command
///
/// Loading already validated the configuration; this prints a summary.
pub fn validate(cfg: &Config, path: &Path) {
    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!(
        "  Config File: {}{}",
        path.display(),
        if path.exists() { "" } else { " (not found, defaults used)" }
    );
    println!("  Listen: {}:{}", cfg.server.host, cfg.server.port);
    println!("  Base Path: {}", cfg.server.base_path);
    println!("  Database: {}", cfg.storage.database_path);
    println!(
        "  Auth: {}",
        if cfg.auth.credentials().is_some() { "basic" } else { "none" }
    );

    info!("Configuration validation successful");
}

/// Sanitize secrets in configuration for safe display
fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();
    if let Some(password) = &sanitized.auth.password {
        sanitized.auth.password = Some(mask_secret(password));
    }
    sanitized
}

/// Mask a secret for safe display
///
/// Example: "hunter2hunter2" -> "hu...r2"
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 6 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("hunter2hunter2"), "hu...r2");
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn test_sanitize_secrets_masks_password() {
        let mut cfg = Config::default();
        cfg.auth.username = Some("admin".to_string());
        cfg.auth.password = Some("correct-horse".to_string());

        let sanitized = sanitize_secrets(&cfg);
        assert_eq!(sanitized.auth.username.as_deref(), Some("admin"));
        assert_eq!(sanitized.auth.password.as_deref(), Some("co...se"));
    }
}
