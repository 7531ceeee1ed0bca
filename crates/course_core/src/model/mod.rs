//! Course domain model.
//!
//! # Responsibility
//! - Define typed course records and the drafts/patches that produce them.
//! - Keep validation as plain functions over static types.
//!
//! # Invariants
//! - Every persisted course has passed `CourseInput::validate()`.

pub mod course;
pub mod validation;
