//! Field-level update operators.
//!
//! # Invariants
//! - `_id` can never be targeted by an update.
//! - Operators apply in the order they were added.

use crate::store::{Document, StoreError, StoreResult, ID_FIELD};
use serde_json::{Number, Value};

#[derive(Debug, Clone, PartialEq)]
enum UpdateOp {
    Set(String, Value),
    Unset(String),
    Inc(String, Number),
}

/// Ordered list of update operators applied to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(field.into(), value.into()));
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(field.into()));
        self
    }

    pub fn inc(mut self, field: impl Into<String>, amount: impl Into<Number>) -> Self {
        self.ops.push(UpdateOp::Inc(field.into(), amount.into()));
        self
    }

    /// Applies all operators to `document` in place.
    ///
    /// # Errors
    /// - `StoreError::InvalidUpdate` when an operator targets `_id` or
    ///   increments a non-numeric field.
    pub fn apply(&self, document: &mut Document) -> StoreResult<()> {
        for op in &self.ops {
            match op {
                UpdateOp::Set(field, value) => {
                    reject_id(field)?;
                    document.insert(field.clone(), value.clone());
                }
                UpdateOp::Unset(field) => {
                    reject_id(field)?;
                    document.remove(field);
                }
                UpdateOp::Inc(field, amount) => {
                    reject_id(field)?;
                    let next = match document.get(field) {
                        None | Some(Value::Null) => Value::Number(amount.clone()),
                        Some(Value::Number(current)) => add_numbers(current, amount),
                        Some(other) => {
                            return Err(StoreError::InvalidUpdate(format!(
                                "cannot increment non-numeric field `{field}` holding {other}"
                            )));
                        }
                    };
                    document.insert(field.clone(), next);
                }
            }
        }
        Ok(())
    }
}

fn reject_id(field: &str) -> StoreResult<()> {
    if field == ID_FIELD {
        return Err(StoreError::InvalidUpdate(format!(
            "field `{ID_FIELD}` is immutable"
        )));
    }
    Ok(())
}

fn add_numbers(current: &Number, amount: &Number) -> Value {
    if let (Some(a), Some(b)) = (current.as_i64(), amount.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Value::from(sum);
        }
    }
    let a = current.as_f64().unwrap_or(0.0);
    let b = amount.as_f64().unwrap_or(0.0);
    Value::from(a + b)
}

#[cfg(test)]
mod tests {
    use super::Update;
    use crate::store::{Document, StoreError};
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn set_unset_and_inc_apply_in_order() {
        let mut document = doc(json!({"author": "Mosh", "seats": 3, "price": 10.5}));
        Update::new()
            .set("author", "Jason")
            .unset("price")
            .inc("seats", 2)
            .inc("views", 1)
            .apply(&mut document)
            .unwrap();

        assert_eq!(
            Value::Object(document),
            json!({"author": "Jason", "seats": 5, "views": 1})
        );
    }

    #[test]
    fn inc_mixes_integer_and_float() {
        let mut document = doc(json!({"price": 10}));
        let half = serde_json::Number::from_f64(0.5).unwrap();
        Update::new().inc("price", half).apply(&mut document).unwrap();
        assert_eq!(document["price"], json!(10.5));
    }

    #[test]
    fn rejects_id_and_non_numeric_increment() {
        let mut document = doc(json!({"name": "Node Course"}));
        let err = Update::new().set("_id", "x").apply(&mut document).unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate(_)));

        let err = Update::new().inc("name", 1).apply(&mut document).unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate(_)));
    }
}
