//! Domain-level error taxonomy shared by all crates.
//!
//! HTTP-specific mapping (status codes, JSON bodies) lives in the api
//! crate; everything below the HTTP surface reports failures as
//! [`CoreError`].

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The entity does not exist, or is not visible to the caller.
    /// Owner-scoped lookups use this for other users' rows too, so a
    /// guessed id leaks nothing about existence.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}
