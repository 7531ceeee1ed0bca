//! Store connection bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Parse connection URIs and open configured SQLite connections.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No document is read or written before migrations succeed.
//! - Connection failures are reported once and never retried.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub mod migrations;
mod open;
pub mod uri;

pub use open::{connect, open_db, open_db_in_memory};
pub use uri::{ConnectionUri, UriHost};

pub type ConnectionResult<T> = Result<T, ConnectionError>;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection and per-operation limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding file databases for `localhost` URIs.
    pub data_dir: PathBuf,
    /// How long a write waits on a locked database.
    pub busy_timeout: Duration,
    /// Deadline applied to every store operation. `None` disables it.
    pub operation_timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            operation_timeout: None,
        }
    }
}

#[derive(Debug)]
pub enum ConnectionError {
    InvalidUri(String),
    Io(std::io::Error),
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl ConnectionError {
    /// Stable code used in log events.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidUri(_) => "invalid_uri",
            Self::Io(_) => "data_dir_failed",
            Self::Sqlite(_) => "db_open_failed",
            Self::UnsupportedSchemaVersion { .. } => "schema_too_new",
        }
    }
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUri(message) => write!(f, "invalid connection uri: {message}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for ConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sqlite(err) => Some(err),
            Self::InvalidUri(_) | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for ConnectionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
