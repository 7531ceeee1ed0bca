//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections from a URI or path.
//! - Configure connection pragmas required by store behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have migrations fully applied.
//! - File databases run in WAL mode with the configured busy timeout.

use super::migrations::apply_migrations;
use super::uri::{ConnectionUri, UriHost};
use super::{ConnectionResult, StoreConfig};
use crate::store::SqliteDocumentStore;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

/// Connects to the document store named by `uri`.
///
/// # Side effects
/// - Creates `config.data_dir` for `localhost` URIs when missing.
/// - Emits `db_connect` logging events with duration and status.
///
/// # Errors
/// - `ConnectionError::InvalidUri` for malformed URIs.
/// - Bootstrap failures from `open_db` / `open_db_in_memory`.
pub fn connect(uri: &str, config: &StoreConfig) -> ConnectionResult<SqliteDocumentStore> {
    let started_at = Instant::now();
    info!("event=db_connect module=db status=start");

    let result = ConnectionUri::parse(uri).and_then(|parsed| {
        let conn = match parsed.database_path(&config.data_dir) {
            Some(path) => {
                std::fs::create_dir_all(&config.data_dir)?;
                open_db(path, config)?
            }
            None => open_db_in_memory(config)?,
        };
        Ok((parsed, conn))
    });

    match result {
        Ok((parsed, conn)) => {
            info!(
                "event=db_connect module=db status=ok host={} database={} duration_ms={}",
                parsed.host.as_str(),
                parsed.database,
                started_at.elapsed().as_millis()
            );
            Ok(SqliteDocumentStore::from_bootstrapped(
                conn,
                config.operation_timeout,
            ))
        }
        Err(err) => {
            error!(
                "event=db_connect module=db status=error duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.error_code(),
                err
            );
            Err(err)
        }
    }
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, config: &StoreConfig) -> ConnectionResult<Connection> {
    open_with(UriHost::Localhost, config, || Connection::open(path))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory(config: &StoreConfig) -> ConnectionResult<Connection> {
    open_with(UriHost::Memory, config, Connection::open_in_memory)
}

fn open_with(
    host: UriHost,
    config: &StoreConfig,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> ConnectionResult<Connection> {
    let started_at = Instant::now();
    let mode = host.as_str();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, host, config) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    host: UriHost,
    config: &StoreConfig,
) -> ConnectionResult<()> {
    conn.busy_timeout(config.busy_timeout)?;
    if host == UriHost::Localhost {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
    }
    apply_migrations(conn)?;
    Ok(())
}
