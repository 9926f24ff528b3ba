//! Domain layer types and invariants.

pub mod chapters;
pub mod error;
pub mod validation;
