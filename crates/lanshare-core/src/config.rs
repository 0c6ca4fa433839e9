//! Configuration management for LanShare.
//!
//! This module provides the configuration system for a LanShare node:
//! - Loading from YAML files
//! - Environment variable overrides
//! - Validation of all settings
//! - Discovery, HTTP catalog, storage and logging sections

use crate::discovery_config::DiscoveryConfig;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Main application configuration.
///
/// Every section falls back to its defaults, so an empty YAML document is a
/// valid configuration.
///
/// # Examples
///
/// ```no_run
/// use lanshare_core::config::AppConfig;
///
/// let config = AppConfig::from_file("lanshare.yaml").unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Peer discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// HTTP catalog server settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Shared folder settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate: the YAML file (optional)
    /// overlaid with `LANSHARE__SECTION__FIELD` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or merged.
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("LANSHARE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<()> {
        self.discovery
            .validate()
            .map_err(|reason| ConfigError::invalid_value("discovery", reason))?;

        self.api.validate()?;
        self.storage.validate()?;
        self.logging.parse_level()?;

        Ok(())
    }
}

/// HTTP catalog server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bind host
    #[serde(default = "default_api_host")]
    pub host: String,

    /// Bind port, also advertised to peers
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Whether to allow cross-origin requests from any LAN page
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Maximum accepted upload body size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

fn default_max_upload_bytes() -> usize {
    1024 * 1024 * 1024 // 1 GiB
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors: true,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ApiConfig {
    /// Validates the API configuration.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ConfigError::invalid_value("api.port", "Port cannot be 0").into());
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "api.max_upload_bytes",
                "Upload limit cannot be 0",
            )
            .into());
        }

        Ok(())
    }

    /// Returns the API server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared folder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the shared files
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
        }
    }
}

impl StorageConfig {
    /// Validates the storage configuration.
    pub fn validate(&self) -> Result<()> {
        if self.upload_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid_value(
                "storage.upload_dir",
                "Upload directory cannot be empty",
            )
            .into());
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::invalid_value("logging.level", format!("Invalid log level: {}", self.level))
                .into()
        })
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
}
