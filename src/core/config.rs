//! Configuration management for the ticket notes service
//!
//! Defaults are suitable for local development; a TOML file and environment
//! variables override them.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default configuration file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "ticket-notes.toml";

/// Available storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-memory storage, lost on restart
    Memory,
    /// In-memory storage with JSON snapshots in the data directory
    Disk,
}

impl std::str::FromStr for StorageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(StorageType::Memory),
            "disk" => Ok(StorageType::Disk),
            other => Err(Error::config(format!(
                "Invalid storage type: {}. Valid options: memory, disk",
                other
            ))),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Ticket counter configuration
    pub counter: CounterConfig,

    /// Cross-origin settings
    pub cors: CorsConfig,

    /// Metrics and monitoring
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: SocketAddr,

    /// Directory of static assets served ahead of the 404 fallback
    pub public_dir: PathBuf,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend type
    pub storage_type: StorageType,

    /// Data directory path (disk backend only)
    pub data_dir: PathBuf,
}

/// Ticket counter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Key of the counter document
    pub id: String,

    /// Value the counter is seeded with; the first ticket is `start_seq + 1`
    pub start_seq: u64,
}

/// Cross-origin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to call the API from a browser
    pub allowed_origins: Vec<String>,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics
    pub enable_prometheus: bool,

    /// Metrics server bind address
    pub metrics_addr: SocketAddr,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, compact)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 3500)),
            public_dir: PathBuf::from("./public"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            id: "ticketId".to_string(),
            start_seq: 499,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable_prometheus: false,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default file (if present) and environment variables
    pub fn load() -> Result<Self> {
        let mut config = if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(DEFAULT_CONFIG_FILE)?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|e| Error::config(format!("Invalid port: {}", e)))?;
            self.server.http_addr.set_port(port);
        }

        if let Some(addr) = lookup("TN_HTTP_ADDR") {
            self.server.http_addr = addr
                .parse()
                .map_err(|e| Error::config(format!("Invalid HTTP address: {}", e)))?;
        }

        if let Some(dir) = lookup("TN_PUBLIC_DIR") {
            self.server.public_dir = PathBuf::from(dir);
        }

        // Storage overrides
        if let Some(data_dir) = lookup("TN_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Some(storage_type) = lookup("TN_STORAGE_TYPE") {
            self.storage.storage_type = storage_type.parse()?;
        }

        // Counter overrides
        if let Some(start) = lookup("TN_COUNTER_START") {
            self.counter.start_seq = start
                .parse()
                .map_err(|e| Error::config(format!("Invalid counter start: {}", e)))?;
        }

        if let Some(origins) = lookup("TN_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }

        // Logging overrides
        if let Some(level) = lookup("TN_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("TN_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.metrics.enable_prometheus
            && self.metrics.metrics_addr.port() == self.server.http_addr.port()
        {
            return Err(Error::config("Port conflict detected"));
        }

        if self.counter.id.trim().is_empty() {
            return Err(Error::config("Counter id must not be empty"));
        }

        if self.counter.start_seq == u64::MAX {
            return Err(Error::config("Counter start leaves no ticket numbers"));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("Invalid log level")),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => return Err(Error::config("Invalid log format")),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.http_addr.port(), 3500);
        assert_eq!(config.counter.id, "ticketId");
        assert_eq!(config.counter.start_seq, 499);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [counter]
            start_seq = 1000

            [storage]
            storage_type = "disk"
            "#,
        )
        .unwrap();

        assert_eq!(config.counter.start_seq, 1000);
        assert_eq!(config.counter.id, "ticketId");
        assert_eq!(config.storage.storage_type, StorageType::Disk);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "4000"),
            ("TN_COUNTER_START", "10"),
            ("TN_ALLOWED_ORIGINS", "http://a.test, http://b.test"),
            ("TN_STORAGE_TYPE", "disk"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.http_addr.port(), 4000);
        assert_eq!(config.counter.start_seq, 10);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(config.storage.storage_type, StorageType::Disk);
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == "PORT").then(|| "nope".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.metrics.enable_prometheus = true;
        config.metrics.metrics_addr = config.server.http_addr;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.counter.id = " ".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.counter.start_seq = u64::MAX;
        assert!(config.validate().is_err());
        config.counter.start_seq = u64::MAX - 1;
        assert!(config.validate().is_ok());
    }
}
