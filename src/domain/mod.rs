//! Domain layer types and invariants.

pub mod date;
pub mod error;
pub mod letter;
pub mod sanitize;
