//! Application services: form validation, the render pipeline and its hooks.

pub mod error;
pub mod letter;
pub mod observer;
pub mod render;
