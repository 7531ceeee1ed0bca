//! Course data-access layer over an embedded document store.
//! This crate is the single source of truth for course invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use db::{connect, ConnectionError, ConnectionUri, StoreConfig};
pub use logging::{
    default_log_level, init_console_logging, init_logging, logging_status, LogTarget,
};
pub use model::course::{Category, Course, CourseId, CourseInput, CoursePatch, CourseSummary};
pub use model::validation::{FieldError, ValidationError};
pub use repo::course_repo::{
    CourseError, CourseFilter, CourseRepository, CourseResult, Page, COURSES_COLLECTION,
};
pub use store::{
    CancelHandle, Document, DocumentId, DocumentStore, Filter, FindOptions, Projection,
    SortDirection, SqliteDocumentStore, StoreError, StoreResult, Update, UpdateOptions,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
