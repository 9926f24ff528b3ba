//! Application services layer.

pub mod chapters;
pub mod error;
pub mod repos;
