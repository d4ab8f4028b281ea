//! Configuration module for possync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//!
//! The remote endpoint itself (URL, tenant, token, auto-sync) is not part of
//! this file: it is the `sync_config` row, edited at runtime through the
//! command layer.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::is_valid_identifier;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for possync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub sync: SyncOptions,
    pub logging: LoggingConfig,
}

/// Local database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file shared with the POS application.
    pub path: PathBuf,
}

/// HTTP client settings for the cloud API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Timeout for the `status` probe, in seconds.
    pub status_timeout_secs: u64,
    /// Timeout for each pull or push request, in seconds.
    pub request_timeout_secs: u64,
}

/// Replication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Business tables that take part in synchronization.
    pub tables: Vec<String>,
    /// Maximum rows per push request.
    pub push_chunk_size: usize,
    /// Default age in days for `clean_log`.
    pub log_retention_days: u32,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/possync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("possync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("possync")
                .join("pos.db"),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            status_timeout_secs: 5,
            request_timeout_secs: 30,
        }
    }
}

/// Tables synchronized out of the box.
const DEFAULT_TABLES: &[&str] = &[
    "clients",
    "suppliers",
    "products",
    "inventory_movements",
    "sales",
    "sale_items",
    "invoices",
];

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            tables: DEFAULT_TABLES.iter().map(|t| t.to_string()).collect(),
            push_chunk_size: 500,
            log_retention_days: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.push_chunk_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- database ---
        if self.database.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "database.path".into(),
                message: "must not be empty".into(),
            });
        }

        // --- remote ---
        if self.remote.status_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "remote.status_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.remote.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "remote.request_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- sync ---
        if self.sync.tables.is_empty() {
            errors.push(ValidationError {
                field: "sync.tables".into(),
                message: "at least one table must be synchronized".into(),
            });
        }
        for table in &self.sync.tables {
            if !is_valid_identifier(table) {
                errors.push(ValidationError {
                    field: "sync.tables".into(),
                    message: format!("invalid table name: {table:?}"),
                });
            }
        }
        if self.sync.push_chunk_size == 0 {
            errors.push(ValidationError {
                field: "sync.push_chunk_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.log_retention_days == 0 {
            errors.push(ValidationError {
                field: "sync.log_retention_days".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "must be one of {:?}, got {:?}",
                    VALID_LOG_LEVELS, self.logging.level
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "must be one of {:?}, got {:?}",
                    VALID_LOG_FORMATS, self.logging.format
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// # Example
///
/// ```
/// use possync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .sync_tables(["products", "sales"])
///     .sync_push_chunk_size(100)
///     .build();
/// assert_eq!(config.sync.tables.len(), 2);
/// ```
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- database ---

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database.path = path.into();
        self
    }

    // --- remote ---

    pub fn remote_status_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote.status_timeout_secs = secs;
        self
    }

    pub fn remote_request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote.request_timeout_secs = secs;
        self
    }

    // --- sync ---

    pub fn sync_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sync.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn sync_push_chunk_size(mut self, size: usize) -> Self {
        self.config.sync.push_chunk_size = size;
        self
    }

    pub fn sync_log_retention_days(mut self, days: u32) -> Self {
        self.config.sync.log_retention_days = days;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
