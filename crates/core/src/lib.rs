//! Shared domain types for the Pixelsmith image generation backend.

pub mod error;
pub mod image;
pub mod types;
