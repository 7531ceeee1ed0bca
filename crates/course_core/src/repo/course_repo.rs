//! Course repository over a document store.
//!
//! # Responsibility
//! - Validate, persist, query and remove course documents.
//! - Translate store results into typed courses and semantic errors.
//!
//! # Invariants
//! - Every write path validates before the document is accepted.
//! - `update_direct` and `remove` rely on the store's atomic primitives and
//!   never read-then-write from here.
//! - Missing ids surface as `CourseError::NotFound` and never write.

use crate::model::course::{
    now_epoch_ms, Course, CourseId, CourseInput, CoursePatch, CourseSummary,
};
use crate::model::validation::ValidationError;
use crate::store::{
    Document, DocumentCheck, DocumentStore, Filter, FindOptions, Projection, SortDirection,
    StoreError, Update, UpdateOptions,
};
use log::{debug, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Collection holding course documents.
pub const COURSES_COLLECTION: &str = "courses";

pub type CourseResult<T> = Result<T, CourseError>;

#[derive(Debug)]
pub enum CourseError {
    Validation(ValidationError),
    NotFound(CourseId),
    InvalidPage { number: u64, size: u64 },
    /// A stored document cannot be decoded into a course.
    InvalidData(String),
    Store(StoreError),
}

impl Display for CourseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "course not found: {id}"),
            Self::InvalidPage { number, size } => write!(
                f,
                "invalid page number={number} size={size}; both must be >= 1"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted course data: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CourseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::NotFound(_) | Self::InvalidPage { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for CourseError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for CourseError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Rejected(err) => Self::Validation(err),
            other => Self::Store(other),
        }
    }
}

/// Exact-match list filter. Absent fields are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFilter {
    pub author: Option<String>,
    pub is_published: Option<bool>,
}

impl CourseFilter {
    pub fn to_filter(&self) -> Filter {
        let mut filter = Filter::All;
        if let Some(author) = self.author.as_ref() {
            filter = filter.and(Filter::eq("author", author.as_str()));
        }
        if let Some(is_published) = self.is_published {
            filter = filter.and(Filter::eq("isPublished", is_published));
        }
        filter
    }
}

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

impl Page {
    pub fn new(number: u64, size: u64) -> Self {
        Self { number, size }
    }

    /// Number of matches skipped before this page.
    pub fn offset(&self) -> u64 {
        self.number.saturating_sub(1).saturating_mul(self.size)
    }

    fn check(self) -> CourseResult<Self> {
        if self.number == 0 || self.size == 0 {
            return Err(CourseError::InvalidPage {
                number: self.number,
                size: self.size,
            });
        }
        Ok(self)
    }
}

/// Data-access facade for course documents.
pub struct CourseRepository<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> CourseRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Validates a draft and stores it.
    ///
    /// # Contract
    /// - Fills `date` with now and `isPublished` with false when unset.
    /// - Returns the stored course with its store-assigned id.
    /// - Validation failures list every invalid field; nothing is written.
    pub fn create(&self, draft: &CourseInput) -> CourseResult<Course> {
        let document = match draft.to_document(now_epoch_ms()) {
            Ok(document) => document,
            Err(err) => {
                warn!(
                    "event=course_create module=repo status=rejected fields={}",
                    err.fields().join(",")
                );
                return Err(err.into());
            }
        };

        let stored = self.store.insert(COURSES_COLLECTION, document)?;
        let course = decode_course(stored)?;
        info!(
            "event=course_create module=repo status=ok course_id={}",
            course.id
        );
        Ok(course)
    }

    pub fn find_by_id(&self, id: CourseId) -> CourseResult<Course> {
        self.store
            .find_by_id(COURSES_COLLECTION, id)?
            .ok_or(CourseError::NotFound(id))
            .and_then(decode_course)
    }

    /// Lists one page of courses matching `filter`, sorted by name.
    ///
    /// Each item carries only `name` and `tags`.
    pub fn list(&self, filter: &CourseFilter, page: Page) -> CourseResult<Vec<CourseSummary>> {
        self.list_matching(filter.to_filter(), page)
    }

    /// Same as `list`, for any store-level filter.
    pub fn list_matching(&self, filter: Filter, page: Page) -> CourseResult<Vec<CourseSummary>> {
        let page = page.check()?;
        let options = FindOptions::new(filter)
            .skip(page.offset())
            .limit(page.size)
            .sort_by("name", SortDirection::Ascending)
            .select(Projection::include(["name", "tags"]).without_id());

        let documents = self.store.find(COURSES_COLLECTION, &options)?;
        debug!(
            "event=course_list module=repo status=ok page={} size={} returned={}",
            page.number,
            page.size,
            documents.len()
        );
        documents
            .into_iter()
            .map(|document| {
                serde_json::from_value(Value::Object(document))
                    .map_err(|err| CourseError::InvalidData(err.to_string()))
            })
            .collect()
    }

    pub fn count(&self, filter: &Filter) -> CourseResult<u64> {
        Ok(self.store.count(COURSES_COLLECTION, filter)?)
    }

    /// Fetches, patches in memory, re-validates and saves a course.
    ///
    /// The stored document is patched as-is, so fields outside the course
    /// model survive the save.
    pub fn update_by_replace(&self, id: CourseId, patch: &CoursePatch) -> CourseResult<Course> {
        if patch.is_empty() {
            return self.find_by_id(id);
        }

        let mut document = self
            .store
            .find_by_id(COURSES_COLLECTION, id)?
            .ok_or(CourseError::NotFound(id))?;
        for (field, value) in patch.set_fields() {
            document.insert(field.to_string(), value);
        }
        if let Err(err) = validate_document(&document) {
            warn!(
                "event=course_update module=repo status=rejected mode=replace course_id={id} fields={}",
                err.fields().join(",")
            );
            return Err(err.into());
        }

        if !self.store.replace(COURSES_COLLECTION, id, document.clone())? {
            return Err(CourseError::NotFound(id));
        }
        info!("event=course_update module=repo status=ok mode=replace course_id={id}");
        decode_course(document)
    }

    /// Applies a patch with one atomic find-and-modify.
    ///
    /// The merged document is validated inside the same atomic step, so a
    /// rejected patch leaves the stored course unchanged.
    pub fn update_direct(&self, id: CourseId, patch: &CoursePatch) -> CourseResult<Course> {
        if patch.is_empty() {
            return self.find_by_id(id);
        }

        let update = patch
            .set_fields()
            .into_iter()
            .fold(Update::new(), |update, (field, value)| update.set(field, value));
        let check: &DocumentCheck = &validate_document;
        let options = UpdateOptions {
            return_updated: true,
            check: Some(check),
        };

        match self
            .store
            .find_and_update(COURSES_COLLECTION, id, &update, options)
        {
            Ok(Some(document)) => {
                info!("event=course_update module=repo status=ok mode=direct course_id={id}");
                decode_course(document)
            }
            Ok(None) => Err(CourseError::NotFound(id)),
            Err(StoreError::Rejected(err)) => {
                warn!(
                    "event=course_update module=repo status=rejected mode=direct course_id={id} fields={}",
                    err.fields().join(",")
                );
                Err(CourseError::Validation(err))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Atomically deletes a course and returns its last state.
    pub fn remove(&self, id: CourseId) -> CourseResult<Course> {
        let document = self
            .store
            .find_and_delete(COURSES_COLLECTION, id)?
            .ok_or(CourseError::NotFound(id))?;
        info!("event=course_remove module=repo status=ok course_id={id}");
        decode_course(document)
    }
}

fn decode_course(document: Document) -> CourseResult<Course> {
    Course::from_document(document).map_err(|err| CourseError::InvalidData(err.to_string()))
}

fn validate_document(document: &Document) -> Result<(), ValidationError> {
    let input: CourseInput =
        serde_json::from_value(Value::Object(document.clone())).map_err(|err| {
            let mut errors = ValidationError::new();
            errors.push("document", err.to_string());
            errors
        })?;
    input.validate()
}
