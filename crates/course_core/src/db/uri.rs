//! Connection URI parsing.
//!
//! Accepted form: `sqlite://<host>/<database>` where host is `memory` or
//! `localhost`.

use crate::db::{ConnectionError, ConnectionResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SCHEME: &str = "sqlite://";
const DATABASE_FILE_EXTENSION: &str = "sqlite3";

static DATABASE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid database name regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriHost {
    /// Private in-memory database, discarded on close.
    Memory,
    /// File database under the configured data directory.
    Localhost,
}

impl UriHost {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Localhost => "localhost",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    pub host: UriHost,
    pub database: String,
}

impl ConnectionUri {
    pub fn parse(uri: &str) -> ConnectionResult<Self> {
        let trimmed = uri.trim();
        let rest = trimmed.strip_prefix(SCHEME).ok_or_else(|| {
            ConnectionError::InvalidUri(format!("expected `{SCHEME}` scheme in `{trimmed}`"))
        })?;

        let (host, database) = rest.split_once('/').ok_or_else(|| {
            ConnectionError::InvalidUri(format!("missing database name in `{trimmed}`"))
        })?;

        let host = match host {
            "memory" => UriHost::Memory,
            "localhost" => UriHost::Localhost,
            other => {
                return Err(ConnectionError::InvalidUri(format!(
                    "unsupported host `{other}`; expected memory|localhost"
                )));
            }
        };

        if !DATABASE_NAME_RE.is_match(database) {
            return Err(ConnectionError::InvalidUri(format!(
                "invalid database name `{database}`; expected [A-Za-z0-9_-]+"
            )));
        }

        Ok(Self {
            host,
            database: database.to_string(),
        })
    }

    /// File location for `localhost` URIs, `None` for in-memory ones.
    pub fn database_path(&self, data_dir: &Path) -> Option<PathBuf> {
        match self.host {
            UriHost::Memory => None,
            UriHost::Localhost => Some(
                data_dir.join(format!("{}.{DATABASE_FILE_EXTENSION}", self.database)),
            ),
        }
    }
}

impl FromStr for ConnectionUri {
    type Err = ConnectionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Display for ConnectionUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.host.as_str(), self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectionUri, UriHost};
    use crate::db::ConnectionError;
    use std::path::Path;

    #[test]
    fn parses_localhost_and_memory_hosts() {
        let uri = ConnectionUri::parse("sqlite://localhost/playground").unwrap();
        assert_eq!(uri.host, UriHost::Localhost);
        assert_eq!(uri.database, "playground");
        assert_eq!(
            uri.database_path(Path::new("/data")),
            Some(Path::new("/data/playground.sqlite3").to_path_buf())
        );

        let memory: ConnectionUri = " sqlite://memory/scratch ".parse().unwrap();
        assert_eq!(memory.host, UriHost::Memory);
        assert_eq!(memory.database_path(Path::new("/data")), None);
        assert_eq!(memory.to_string(), "sqlite://memory/scratch");
    }

    #[test]
    fn rejects_bad_scheme_host_and_name() {
        for uri in [
            "mongodb://localhost/playground",
            "sqlite://localhost",
            "sqlite://db.example.com/playground",
            "sqlite://localhost/",
            "sqlite://localhost/../etc",
        ] {
            let err = ConnectionUri::parse(uri).unwrap_err();
            assert!(
                matches!(err, ConnectionError::InvalidUri(_)),
                "unexpected error for {uri}: {err}"
            );
        }
    }
}
