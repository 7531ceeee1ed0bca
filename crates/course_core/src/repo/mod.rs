//! Repository layer over the document store.
//!
//! # Responsibility
//! - Expose course use-cases as typed, validated operations.
//! - Isolate document shapes and store errors from callers.
//!
//! # Invariants
//! - Repository writes must pass course validation before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Validation`) in
//!   addition to store transport errors.

pub mod course_repo;
