//! Process configuration from environment variables.
//!
//! # Invariants
//! - Blank variables are treated as unset.
//! - Every value has a default except `COURSES_LOG_DIR` and
//!   `COURSES_OP_TIMEOUT_MS`, which are optional features.

use crate::db::{StoreConfig, DEFAULT_BUSY_TIMEOUT};
use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DATABASE_URI_VAR: &str = "COURSES_DATABASE_URI";
pub const DATA_DIR_VAR: &str = "COURSES_DATA_DIR";
pub const LOG_LEVEL_VAR: &str = "COURSES_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "COURSES_LOG_DIR";
pub const OP_TIMEOUT_MS_VAR: &str = "COURSES_OP_TIMEOUT_MS";
pub const BUSY_TIMEOUT_MS_VAR: &str = "COURSES_BUSY_TIMEOUT_MS";

pub const DEFAULT_DATABASE_URI: &str = "sqlite://localhost/playground";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Resolved application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_uri: String,
    pub log_level: String,
    /// File logging directory; console logging when unset.
    pub log_dir: Option<String>,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an injected variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let operation_timeout = match read(OP_TIMEOUT_MS_VAR) {
            Some(value) => {
                let millis = parse_millis(OP_TIMEOUT_MS_VAR, &value)?;
                if millis == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: OP_TIMEOUT_MS_VAR,
                        value,
                        reason: "must be greater than zero",
                    });
                }
                Some(Duration::from_millis(millis))
            }
            None => None,
        };

        let busy_timeout = match read(BUSY_TIMEOUT_MS_VAR) {
            Some(value) => Duration::from_millis(parse_millis(BUSY_TIMEOUT_MS_VAR, &value)?),
            None => DEFAULT_BUSY_TIMEOUT,
        };

        Ok(Self {
            database_uri: read(DATABASE_URI_VAR)
                .unwrap_or_else(|| DEFAULT_DATABASE_URI.to_string()),
            log_level: read(LOG_LEVEL_VAR).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(LOG_DIR_VAR),
            store: StoreConfig {
                data_dir: read(DATA_DIR_VAR).map_or_else(|| PathBuf::from("."), PathBuf::from),
                busy_timeout,
                operation_timeout,
            },
        })
    }
}

fn parse_millis(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: "expected a non-negative integer number of milliseconds",
    })
}
