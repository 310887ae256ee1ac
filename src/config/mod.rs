//! Configuration management for the Data API client
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bulk::{BulkWriteOptions, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, InsertManyOptions};
use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Per-command settings
    #[serde(default)]
    pub commands: CommandConfig,

    /// Bulk write defaults
    #[serde(default)]
    pub bulk: BulkConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-command configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Request timeout in milliseconds, 0 disables the timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Defaults for insert-many and bulk-write runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Documents per insert-many request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Workers for unordered runs
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Run bulk operations in order by default
    #[serde(default)]
    pub ordered: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_timeout_ms() -> u64 {
    30_000
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            concurrency: default_concurrency(),
            ordered: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from multiple sources with proper precedence
    ///
    /// The file at [`Config::default_path`] is optional.
    ///
    /// # Returns
    /// * `Result<Config>` - Merged configuration or error
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables are prefixed with DATAAPI_
    /// Example: DATAAPI_TIMEOUT_MS=5000
    ///
    /// # Returns
    /// * `Result<Config>` - Configuration from environment or default
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DATAAPI_*` overrides read through `lookup`
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DATAAPI_TIMEOUT_MS") {
            self.commands.timeout_ms = parse_value("DATAAPI_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("DATAAPI_CHUNK_SIZE") {
            self.bulk.chunk_size = parse_value("DATAAPI_CHUNK_SIZE", &value)?;
        }
        if let Some(value) = lookup("DATAAPI_CONCURRENCY") {
            self.bulk.concurrency = parse_value("DATAAPI_CONCURRENCY", &value)?;
        }
        if let Some(value) = lookup("DATAAPI_LOG_LEVEL") {
            self.logging.level = value.parse()?;
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dataapi")
            .join("config.toml")
    }

    /// Save configuration to a file
    ///
    /// # Arguments
    /// * `path` - Path where to save the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.bulk.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "bulk.chunk_size".to_string(),
                value: self.bulk.chunk_size.to_string(),
            }
            .into());
        }
        if self.bulk.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "bulk.concurrency".to_string(),
                value: self.bulk.concurrency.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Get the command timeout as Duration, `None` when disabled
    pub fn command_timeout(&self) -> Option<Duration> {
        match self.commands.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl BulkConfig {
    /// Insert-many options carrying the configured ordering
    pub fn insert_many_options(&self) -> InsertManyOptions {
        InsertManyOptions {
            ordered: self.ordered,
            ..InsertManyOptions::default()
        }
    }

    /// Bulk-write options carrying the configured ordering
    pub fn bulk_write_options(&self) -> BulkWriteOptions {
        BulkWriteOptions {
            ordered: self.ordered,
            ..BulkWriteOptions::default()
        }
    }
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = crate::error::DataApiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: s.to_string(),
            }
            .into()),
        }
    }
}
