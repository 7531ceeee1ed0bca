//! Find options: sort, skip, limit and projection.
//!
//! Built by chaining in cursor order, then evaluated in a fixed order:
//! filter, sort, skip, limit, project.

use crate::store::filter::{compare_values, lookup, Filter};
use crate::store::{Document, ID_FIELD};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Inclusive field projection over top-level fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<String>,
    include_id: bool,
}

impl Projection {
    /// Keeps only `fields` plus `_id`.
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            include_id: true,
        }
    }

    /// Drops `_id` from projected documents.
    pub fn without_id(mut self) -> Self {
        self.include_id = false;
        self
    }

    pub fn apply(&self, mut document: Document) -> Document {
        let include_id = self.include_id;
        document.retain(|key, _| {
            (include_id && key == ID_FIELD) || self.fields.iter().any(|field| field == key)
        });
        document
    }
}

/// Query options mirroring a chained cursor.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
    pub projection: Option<Projection>,
}

impl FindOptions {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Appends a sort key; earlier keys take precedence.
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Evaluates the options over documents given in insertion order.
    ///
    /// Sorting is stable, so ties keep insertion order.
    pub fn apply(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut selected: Vec<Document> = documents
            .into_iter()
            .filter(|document| self.filter.matches(document))
            .collect();

        if !self.sort.is_empty() {
            selected.sort_by(|left, right| self.compare(left, right));
        }

        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let limit = self
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        selected
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| match self.projection.as_ref() {
                Some(projection) => projection.apply(document),
                None => document,
            })
            .collect()
    }

    fn compare(&self, left: &Document, right: &Document) -> Ordering {
        for key in &self.sort {
            let a = lookup(left, &key.field).unwrap_or(&Value::Null);
            let b = lookup(right, &key.field).unwrap_or(&Value::Null);
            let ordering = match key.direction {
                SortDirection::Ascending => compare_values(a, b),
                SortDirection::Descending => compare_values(b, a),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
