use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::Credentials;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix the log viewer API is mounted under
    pub base_path: String,
    pub log_level: String,
    /// "text" or "json"
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_path: "/__log_viewer__".to_string(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "./data/logs.db".to_string(),
        }
    }
}

/// Credentials guarding the log viewer API
///
/// Both fields unset leaves the API open to whatever the host puts in front of it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuthConfig {
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username.clone(), password.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "/metrics".to_string(),
        }
    }
}

/// Load configuration from `path` (optional) and `LOG_VIEWER__*` environment variables
///
/// Example: `LOG_VIEWER__SERVER__PORT=9000`.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("LOG_VIEWER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    let base_path = &cfg.server.base_path;
    if !base_path.starts_with('/') {
        anyhow::bail!("server.base_path must start with '/', got '{}'", base_path);
    }
    if base_path.len() > 1 && base_path.ends_with('/') {
        anyhow::bail!("server.base_path must not end with '/', got '{}'", base_path);
    }

    if !matches!(cfg.server.log_format.as_str(), "text" | "json") {
        anyhow::bail!("server.log_format must be 'text' or 'json', got '{}'", cfg.server.log_format);
    }

    if cfg.storage.database_path.trim().is_empty() {
        anyhow::bail!("storage.database_path cannot be empty");
    }

    match (&cfg.auth.username, &cfg.auth.password) {
        (Some(_), None) | (None, Some(_)) => {
            anyhow::bail!("auth.username and auth.password must be set together");
        }
        (Some(username), Some(_)) if username.is_empty() => {
            anyhow::bail!("auth.username cannot be empty");
        }
        _ => {}
    }

    if cfg.metrics.enabled && !cfg.metrics.endpoint.starts_with('/') {
        anyhow::bail!("metrics.endpoint must start with '/', got '{}'", cfg.metrics.endpoint);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = Config::default();
        assert!(validate_config(&cfg).is_ok());
        assert_eq!(cfg.server.base_path, "/__log_viewer__");
        assert!(cfg.auth.credentials().is_none());
    }

    #[test]
    fn test_validate_config_rejects_half_credentials() {
        let mut cfg = Config::default();
        cfg.auth.username = Some("admin".to_string());

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("must be set together"));
    }

    #[test]
    fn test_validate_config_rejects_bad_base_path() {
        let mut cfg = Config::default();
        cfg.server.base_path = "logs".to_string();
        assert!(validate_config(&cfg).is_err());

        cfg.server.base_path = "/logs/".to_string();
        assert!(validate_config(&cfg).is_err());

        cfg.server.base_path = "/".to_string();
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn test_validate_config_rejects_empty_database_path() {
        let mut cfg = Config::default();
        cfg.storage.database_path = "  ".to_string();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[storage]
database_path = "/tmp/test-logs.db"

[auth]
username = "admin"
password = "secret"
"#
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.storage.database_path, "/tmp/test-logs.db");
        assert!(cfg.auth.credentials().is_some());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.server.port, 8080);
    }
}
