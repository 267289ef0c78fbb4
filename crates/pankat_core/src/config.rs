//! Runtime configuration for hosts embedding the article store.
//!
//! # Responsibility
//! - Describe where the article database lives and how connections behave.
//! - Carry logging preferences to `init_logging`.
//!
//! # Invariants
//! - Missing variables fall back to defaults; malformed values are errors.
//! - Loading never touches the filesystem.

use crate::db::DEFAULT_BUSY_TIMEOUT;
use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "PANKAT_DB_PATH";
pub const ENV_DB_BUSY_TIMEOUT_MS: &str = "PANKAT_DB_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "PANKAT_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "PANKAT_LOG_DIR";

/// Where the SQLite database is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    /// Private in-memory database, dropped with the connection.
    Memory,
    /// Database file on disk.
    File(PathBuf),
}

/// Connection-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub location: DbLocation,
    pub busy_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            location: DbLocation::Memory,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Top-level configuration consumed by hosts (CLI, generators).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db: DbConfig,
    pub log_level: String,
    /// Logging stays disabled when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(path) = read(ENV_DB_PATH) {
            config.db.location = if path == ":memory:" {
                DbLocation::Memory
            } else {
                DbLocation::File(PathBuf::from(path))
            };
        }

        if let Some(raw) = read(ENV_DB_BUSY_TIMEOUT_MS) {
            let millis = raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: ENV_DB_BUSY_TIMEOUT_MS,
                value: raw.clone(),
            })?;
            config.db.busy_timeout = Duration::from_millis(millis);
        }

        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }

        config.log_dir = read(ENV_LOG_DIR).map(PathBuf::from);

        Ok(config)
    }
}

/// Configuration parsing error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for `{key}`")
            }
        }
    }
}

impl Error for ConfigError {}
