//! Field-level validation errors.
//!
//! # Invariants
//! - At most one message is kept per field.
//! - Field order follows the order in which rules were evaluated.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// One violated rule for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Collected validation failures for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure unless the field already has one.
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        if self.message_for(field).is_some() {
            return;
        }
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Names of all invalid fields, in evaluation order.
    pub fn fields(&self) -> Vec<&'static str> {
        self.errors.iter().map(|error| error.field).collect()
    }

    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    /// Converts the collected errors into a `Result`.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Course validation failed")?;
        for (index, error) in self.errors.iter().enumerate() {
            let separator = if index == 0 { ": " } else { ", " };
            write!(f, "{separator}{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl Error for ValidationError {}
