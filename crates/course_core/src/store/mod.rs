//! Document store contract and implementations.
//!
//! # Responsibility
//! - Define the minimal document-store API the course layer depends on.
//! - Keep storage engine details (SQLite, JSON bodies) behind that API.
//!
//! # Invariants
//! - Every stored document gets an `_id` exactly once, at insert.
//! - `find_and_update` and `find_and_delete` are atomic per document.
//! - Documents returned by the store always carry `_id` unless projected away.

use crate::model::validation::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use uuid::Uuid;

pub mod filter;
pub mod options;
pub mod sqlite;
pub mod update;

pub use filter::Filter;
pub use options::{FindOptions, Projection, SortDirection, SortKey};
pub use sqlite::{CancelHandle, SqliteDocumentStore};
pub use update::Update;

/// Schemaless document body.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Store-assigned document identifier.
pub type DocumentId = Uuid;

/// Reserved key carrying the document id.
pub const ID_FIELD: &str = "_id";

pub type StoreResult<T> = Result<T, StoreError>;

/// Check run against the merged document inside an atomic update.
pub type DocumentCheck = dyn Fn(&Document) -> Result<(), ValidationError>;

/// Options for `DocumentStore::find_and_update`.
#[derive(Clone, Copy, Default)]
pub struct UpdateOptions<'a> {
    /// Return the post-update document instead of the pre-update one.
    pub return_updated: bool,
    /// Rejects the update, leaving the stored document untouched.
    pub check: Option<&'a DocumentCheck>,
}

/// Errors from document store operations.
#[derive(Debug)]
pub enum StoreError {
    Db(rusqlite::Error),
    /// The operation ran past its configured deadline and was interrupted.
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    /// The operation was interrupted through a `CancelHandle`.
    Cancelled { operation: &'static str },
    /// Persisted data cannot be decoded into a document.
    InvalidData(String),
    InvalidUpdate(String),
    /// An update check rejected the merged document.
    Rejected(ValidationError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Timeout { operation, timeout } => write!(
                f,
                "store operation `{operation}` timed out after {}ms",
                timeout.as_millis()
            ),
            Self::Cancelled { operation } => {
                write!(f, "store operation `{operation}` was cancelled")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted document: {message}"),
            Self::InvalidUpdate(message) => write!(f, "invalid update: {message}"),
            Self::Rejected(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(value)
    }
}

/// Minimal document-store contract.
///
/// Implementations own id assignment and the atomicity of the
/// find-and-modify primitives.
pub trait DocumentStore {
    /// Inserts a new document and returns it with its assigned `_id`.
    ///
    /// Any `_id` already present in `document` is replaced.
    fn insert(&self, collection: &str, document: Document) -> StoreResult<Document>;

    /// Materializes all documents selected by `options`.
    fn find(&self, collection: &str, options: &FindOptions) -> StoreResult<Vec<Document>>;

    /// Counts documents matching `filter`.
    fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    fn find_by_id(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>>;

    /// Overwrites the body of an existing document. Returns `false` when
    /// `id` does not exist.
    fn replace(&self, collection: &str, id: DocumentId, document: Document) -> StoreResult<bool>;

    /// Atomically applies `update` to one document.
    ///
    /// Returns `None` without writing when `id` does not exist.
    fn find_and_update(
        &self,
        collection: &str,
        id: DocumentId,
        update: &Update,
        options: UpdateOptions<'_>,
    ) -> StoreResult<Option<Document>>;

    /// Atomically deletes one document and returns its last state.
    fn find_and_delete(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn insert(&self, collection: &str, document: Document) -> StoreResult<Document> {
        (**self).insert(collection, document)
    }

    fn find(&self, collection: &str, options: &FindOptions) -> StoreResult<Vec<Document>> {
        (**self).find(collection, options)
    }

    fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        (**self).count(collection, filter)
    }

    fn find_by_id(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        (**self).find_by_id(collection, id)
    }

    fn replace(&self, collection: &str, id: DocumentId, document: Document) -> StoreResult<bool> {
        (**self).replace(collection, id, document)
    }

    fn find_and_update(
        &self,
        collection: &str,
        id: DocumentId,
        update: &Update,
        options: UpdateOptions<'_>,
    ) -> StoreResult<Option<Document>> {
        (**self).find_and_update(collection, id, update, options)
    }

    fn find_and_delete(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        (**self).find_and_delete(collection, id)
    }
}
