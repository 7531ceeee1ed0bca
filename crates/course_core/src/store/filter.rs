//! Document filters and value ordering.
//!
//! # Responsibility
//! - Express query predicates over JSON documents.
//! - Define the total order used for sorting and range comparisons.
//!
//! # Invariants
//! - Range operators only match values in the same type bracket.
//! - A predicate on an array field matches when any element matches.
//! - `eq null` and `ne` match documents where the field is missing.

use crate::store::Document;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::cmp::Ordering;

/// Predicate over a single document.
#[derive(Debug, Clone, Default)]
pub enum Filter {
    /// Matches every document.
    #[default]
    All,
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    Nin(String, Vec<Value>),
    Regex(String, Regex),
    And(Vec<Filter>),
    /// Matches when any branch matches. An empty list matches nothing.
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(field.into(), value.into())
    }

    pub fn is_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::Nin(field.into(), values.into_iter().map(Into::into).collect())
    }

    /// Builds a regex predicate on a string field.
    ///
    /// # Errors
    /// - Returns the regex compile error for an invalid `pattern`.
    pub fn regex(
        field: impl Into<String>,
        pattern: &str,
        case_insensitive: bool,
    ) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self::Regex(field.into(), regex))
    }

    /// Conjunction that flattens nested `And` and drops `All`.
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self {
            Self::All => Vec::new(),
            Self::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Self::All => {}
            Self::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        match parts.len() {
            0 => Self::All,
            1 => parts.pop().unwrap_or(Self::All),
            _ => Self::And(parts),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut branches) => {
                branches.push(other);
                Self::Or(branches)
            }
            single => Self::Or(vec![single, other]),
        }
    }

    /// Evaluates this predicate against one document.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Eq(field, expected) => field_equals(lookup(document, field), expected),
            Self::Ne(field, expected) => !field_equals(lookup(document, field), expected),
            Self::Gt(field, bound) => compare_field(document, field, bound, Ordering::is_gt),
            Self::Gte(field, bound) => compare_field(document, field, bound, Ordering::is_ge),
            Self::Lt(field, bound) => compare_field(document, field, bound, Ordering::is_lt),
            Self::Lte(field, bound) => compare_field(document, field, bound, Ordering::is_le),
            Self::In(field, candidates) => {
                let actual = lookup(document, field);
                candidates
                    .iter()
                    .any(|candidate| field_equals(actual, candidate))
            }
            Self::Nin(field, candidates) => {
                let actual = lookup(document, field);
                !candidates
                    .iter()
                    .any(|candidate| field_equals(actual, candidate))
            }
            Self::Regex(field, regex) => {
                any_element(lookup(document, field), |value| {
                    value.as_str().is_some_and(|text| regex.is_match(text))
                })
            }
            Self::And(parts) => parts.iter().all(|part| part.matches(document)),
            Self::Or(branches) => branches.iter().any(|branch| branch.matches(document)),
        }
    }
}

/// Resolves a dotted field path inside a document.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Total order across JSON values.
///
/// Brackets: null < numbers < strings < objects < arrays < booleans.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    let bracket = bracket_rank(left).cmp(&bracket_rank(right));
    if bracket != Ordering::Equal {
        return bracket;
    }

    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let ordering = compare_values(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(a), Value::Object(b)) => {
            for ((key_a, value_a), (key_b, value_b)) in a.iter().zip(b.iter()) {
                let ordering = key_a
                    .cmp(key_b)
                    .then_with(|| compare_values(value_a, value_b));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.len().cmp(&b.len())
        }
        _ => Ordering::Equal,
    }
}

fn bracket_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => compare_values(left, right) == Ordering::Equal,
        _ => left == right,
    }
}

fn field_equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(value) if values_equal(value, expected) => true,
        Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, expected)),
        Some(_) => false,
    }
}

fn any_element(actual: Option<&Value>, predicate: impl Fn(&Value) -> bool) -> bool {
    match actual {
        None => false,
        Some(Value::Array(items)) => items.iter().any(&predicate),
        Some(value) => predicate(value),
    }
}

fn compare_field(
    document: &Document,
    field: &str,
    bound: &Value,
    accept: fn(Ordering) -> bool,
) -> bool {
    any_element(lookup(document, field), |value| {
        bracket_rank(value) == bracket_rank(bound) && accept(compare_values(value, bound))
    })
}
