//! Course domain model and validation rules.
//!
//! # Responsibility
//! - Define the persisted `Course` record and its draft/patch/summary shapes.
//! - Own the validation rules every write path must pass.
//!
//! # Invariants
//! - `id` is assigned by the store and never changes.
//! - `name`, `category` and `tags` are always valid on a persisted course.
//! - `price` is present whenever `is_published` is true.

use crate::model::validation::ValidationError;
use crate::store::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Store-assigned course identifier.
pub type CourseId = Uuid;

pub const NAME_MIN_CHARS: usize = 5;
pub const NAME_MAX_CHARS: usize = 255;
pub const PRICE_MIN: f64 = 10.0;
pub const PRICE_MAX: f64 = 200.0;

/// Fixed set of course categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Web,
    Mobile,
    Network,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Web, Category::Mobile, Category::Network];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Mobile => "mobile",
            Self::Network => "network",
        }
    }

    /// Parses an exact, lowercase category name.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
    }
}

/// Persisted course document.
///
/// Serialized with camelCase keys and the id under `_id`, which is the
/// document shape used in the `courses` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: CourseId,
    pub name: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub tags: Vec<String>,
    /// Unix epoch milliseconds.
    pub date: i64,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl Course {
    /// Decodes a stored document into a typed course.
    pub fn from_document(document: Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(document))
    }
}

/// Unvalidated course draft, as supplied by callers.
///
/// Every field is optional here so that missing values surface as
/// validation errors rather than construction failures. Category is kept as
/// raw text for the same reason.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CourseInput {
    pub name: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    /// Unix epoch milliseconds; defaults to creation time.
    pub date: Option<i64>,
    pub is_published: Option<bool>,
    pub price: Option<f64>,
}

impl CourseInput {
    /// Applies every course rule and collects one message per invalid field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();

        match self.name.as_deref() {
            None | Some("") => errors.push("name", required_message("name")),
            Some(name) => {
                let chars = name.chars().count();
                if chars < NAME_MIN_CHARS {
                    errors.push(
                        "name",
                        format!(
                            "Path `name` (`{name}`) is shorter than the minimum allowed length ({NAME_MIN_CHARS})."
                        ),
                    );
                } else if chars > NAME_MAX_CHARS {
                    errors.push(
                        "name",
                        format!(
                            "Path `name` (`{name}`) is longer than the maximum allowed length ({NAME_MAX_CHARS})."
                        ),
                    );
                }
            }
        }

        match self.category.as_deref() {
            None | Some("") => errors.push("category", required_message("category")),
            Some(value) if Category::parse(value).is_none() => errors.push(
                "category",
                format!("`{value}` is not a valid enum value for path `category`."),
            ),
            Some(_) => {}
        }

        if self.tags.is_empty() {
            errors.push("tags", "A course should have at least one tag.");
        }

        match self.price {
            None if self.is_published == Some(true) => {
                errors.push("price", required_message("price"));
            }
            None => {}
            Some(price) if !price.is_finite() => {
                errors.push("price", "Path `price` must be a finite number.");
            }
            Some(price) if price < PRICE_MIN => errors.push(
                "price",
                format!("Path `price` ({price}) is less than minimum allowed value ({PRICE_MIN})."),
            ),
            Some(price) if price > PRICE_MAX => errors.push(
                "price",
                format!("Path `price` ({price}) is more than maximum allowed value ({PRICE_MAX})."),
            ),
            Some(_) => {}
        }

        errors.into_result()
    }

    /// Validates the draft and builds the document to insert.
    ///
    /// Defaults: `date` falls back to `now_ms`, `isPublished` to false.
    pub fn to_document(&self, now_ms: i64) -> Result<Document, ValidationError> {
        self.validate()?;

        let mut document = Document::new();
        document.insert("name".to_string(), Value::from(self.name.clone()));
        document.insert("category".to_string(), Value::from(self.category.clone()));
        if let Some(author) = self.author.as_ref() {
            document.insert("author".to_string(), Value::from(author.as_str()));
        }
        document.insert("tags".to_string(), Value::from(self.tags.clone()));
        document.insert(
            "date".to_string(),
            Value::from(self.date.unwrap_or(now_ms)),
        );
        document.insert(
            "isPublished".to_string(),
            Value::from(self.is_published.unwrap_or(false)),
        );
        if let Some(price) = self.price {
            document.insert("price".to_string(), Value::from(price));
        }
        Ok(document)
    }
}

/// Partial update applied by both update strategies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoursePatch {
    pub is_published: Option<bool>,
    pub author: Option<String>,
    pub price: Option<f64>,
}

impl CoursePatch {
    pub fn is_empty(&self) -> bool {
        self.is_published.is_none() && self.author.is_none() && self.price.is_none()
    }

    /// Field/value pairs to `$set` on the stored document.
    pub fn set_fields(&self) -> Vec<(&'static str, Value)> {
        let mut fields = Vec::new();
        if let Some(is_published) = self.is_published {
            fields.push(("isPublished", Value::from(is_published)));
        }
        if let Some(author) = self.author.as_ref() {
            fields.push(("author", Value::from(author.as_str())));
        }
        if let Some(price) = self.price {
            fields.push(("price", Value::from(price)));
        }
        fields
    }
}

/// Projected list view: only `name` and `tags` are populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

fn required_message(field: &str) -> String {
    format!("Path `{field}` is required.")
}
