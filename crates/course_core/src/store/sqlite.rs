//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist JSON document bodies keyed by `(collection, id)`.
//! - Provide atomic find-and-modify primitives on top of SQLite.
//! - Bound every operation by an optional deadline and support cancellation.
//!
//! # Invariants
//! - Bodies are stored without `_id`; the id lives only in the `id` column.
//! - Find-and-update runs inside one `IMMEDIATE` transaction.
//! - Find-and-delete is a single `DELETE ... RETURNING` statement.
//! - Scans return documents in insertion (`rowid`) order before sorting.

use crate::db::migrations::{current_user_version, latest_version};
use crate::store::{
    Document, DocumentId, DocumentStore, Filter, FindOptions, StoreError, StoreResult, Update,
    UpdateOptions, ID_FIELD,
};
use rusqlite::ffi::ErrorCode;
use rusqlite::{
    params, Connection, InterruptHandle, OptionalExtension, Transaction, TransactionBehavior,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Number of SQLite VM steps between deadline checks.
const DEADLINE_CHECK_INTERVAL_OPS: i32 = 100;

/// Cross-thread handle that interrupts the store's running statement.
pub struct CancelHandle {
    inner: InterruptHandle,
}

impl CancelHandle {
    /// Interrupts the statement in flight, if any.
    pub fn cancel(&self) {
        self.inner.interrupt();
    }
}

/// Document store over one SQLite connection.
pub struct SqliteDocumentStore {
    conn: Connection,
    operation_timeout: Option<Duration>,
}

impl SqliteDocumentStore {
    /// Wraps an already migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is not current.
    /// - `MissingRequiredTable` when the `documents` table is absent.
    pub fn try_new(conn: Connection, operation_timeout: Option<Duration>) -> StoreResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(&conn)?;
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = 'documents'
            );",
            [],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(StoreError::MissingRequiredTable("documents"));
        }

        Ok(Self::from_bootstrapped(conn, operation_timeout))
    }

    pub(crate) fn from_bootstrapped(conn: Connection, operation_timeout: Option<Duration>) -> Self {
        Self {
            conn,
            operation_timeout,
        }
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    pub fn set_operation_timeout(&mut self, timeout: Option<Duration>) {
        self.operation_timeout = timeout;
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            inner: self.conn.get_interrupt_handle(),
        }
    }

    /// Closes the underlying connection.
    pub fn close(self) -> StoreResult<()> {
        self.conn.close().map_err(|(_, err)| StoreError::Db(err))
    }

    /// Runs one operation under the configured deadline.
    fn run<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let timed_out = Arc::new(AtomicBool::new(false));
        if let Some(timeout) = self.operation_timeout {
            let deadline = Instant::now() + timeout;
            let flag = Arc::clone(&timed_out);
            let handler = move || {
                if Instant::now() >= deadline {
                    flag.store(true, Ordering::SeqCst);
                    return true;
                }
                false
            };
            self.conn.progress_handler(DEADLINE_CHECK_INTERVAL_OPS, Some(handler));
        }

        let result = body(&self.conn);

        if self.operation_timeout.is_some() {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }

        result.map_err(|err| match err {
            StoreError::Db(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == ErrorCode::OperationInterrupted =>
            {
                if timed_out.load(Ordering::SeqCst) {
                    StoreError::Timeout {
                        operation,
                        timeout: self.operation_timeout.unwrap_or_default(),
                    }
                } else {
                    StoreError::Cancelled { operation }
                }
            }
            other => other,
        })
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn insert(&self, collection: &str, mut document: Document) -> StoreResult<Document> {
        self.run("insert", |conn| {
            document.remove(ID_FIELD);
            let id = Uuid::new_v4();
            let body = encode_body(&document)?;
            conn.execute(
                "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3);",
                params![collection, id.to_string(), body],
            )?;
            document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            Ok(document)
        })
    }

    fn find(&self, collection: &str, options: &FindOptions) -> StoreResult<Vec<Document>> {
        self.run("find", |conn| {
            let documents = scan_collection(conn, collection)?;
            Ok(options.apply(documents))
        })
    }

    fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.run("count", |conn| {
            let matched = scan_collection(conn, collection)?
                .iter()
                .filter(|document| filter.matches(document))
                .count();
            Ok(u64::try_from(matched).unwrap_or(u64::MAX))
        })
    }

    fn find_by_id(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        self.run("find_by_id", |conn| load_document(conn, collection, id))
    }

    fn replace(
        &self,
        collection: &str,
        id: DocumentId,
        mut document: Document,
    ) -> StoreResult<bool> {
        self.run("replace", |conn| {
            document.remove(ID_FIELD);
            let body = encode_body(&document)?;
            let changed = conn.execute(
                "UPDATE documents
                 SET
                    body = ?3,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE collection = ?1 AND id = ?2;",
                params![collection, id.to_string(), body],
            )?;
            Ok(changed > 0)
        })
    }

    fn find_and_update(
        &self,
        collection: &str,
        id: DocumentId,
        update: &Update,
        options: UpdateOptions<'_>,
    ) -> StoreResult<Option<Document>> {
        self.run("find_and_update", |conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
            let Some(original) = load_document(&tx, collection, id)? else {
                return Ok(None);
            };

            let mut updated = original.clone();
            update.apply(&mut updated)?;
            if let Some(check) = options.check {
                check(&updated).map_err(StoreError::Rejected)?;
            }

            let mut body = updated.clone();
            body.remove(ID_FIELD);
            tx.execute(
                "UPDATE documents
                 SET
                    body = ?3,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE collection = ?1 AND id = ?2;",
                params![collection, id.to_string(), encode_body(&body)?],
            )?;
            tx.commit()?;

            Ok(Some(if options.return_updated {
                updated
            } else {
                original
            }))
        })
    }

    fn find_and_delete(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        self.run("find_and_delete", |conn| {
            let row = conn
                .query_row(
                    "DELETE FROM documents
                     WHERE collection = ?1 AND id = ?2
                     RETURNING id, body;",
                    params![collection, id.to_string()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;
            row.map(|(id_text, body)| decode_document(&id_text, &body))
                .transpose()
        })
    }
}

fn scan_collection(conn: &Connection, collection: &str) -> StoreResult<Vec<Document>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, body
         FROM documents
         WHERE collection = ?1
         ORDER BY rowid ASC;",
    )?;
    let mut rows = stmt.query([collection])?;
    let mut documents = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get(0)?;
        let body: String = row.get(1)?;
        documents.push(decode_document(&id_text, &body)?);
    }
    Ok(documents)
}

fn load_document(
    conn: &Connection,
    collection: &str,
    id: DocumentId,
) -> StoreResult<Option<Document>> {
    let row = conn
        .query_row(
            "SELECT id, body
             FROM documents
             WHERE collection = ?1 AND id = ?2;",
            params![collection, id.to_string()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    row.map(|(id_text, body)| decode_document(&id_text, &body))
        .transpose()
}

fn encode_body(document: &Document) -> StoreResult<String> {
    serde_json::to_string(document)
        .map_err(|err| StoreError::InvalidData(format!("cannot encode document body: {err}")))
}

fn decode_document(id_text: &str, body: &str) -> StoreResult<Document> {
    Uuid::parse_str(id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid id value `{id_text}` in documents.id"))
    })?;
    let mut document: Document = serde_json::from_str(body).map_err(|err| {
        StoreError::InvalidData(format!("invalid body for document `{id_text}`: {err}"))
    })?;
    document.insert(ID_FIELD.to_string(), Value::String(id_text.to_string()));
    Ok(document)
}
