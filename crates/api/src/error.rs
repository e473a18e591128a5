//! HTTP error surface.
//!
//! Every handler returns [`AppResult<T>`]; failures render as a JSON
//! body with a human-readable `error` and a stable machine-readable
//! `code`. Internal details (database messages, upstream bodies) are
//! logged, never sent to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use pixelsmith_core::error::CoreError;
use pixelsmith_fal::FalError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Inference service failure at submission time. Poll failures
    /// never reach this type; the monitor absorbs them.
    #[error("Inference service error: {0}")]
    Fal(#[from] FalError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Status, wire code, and client-facing message for one error.
type Rendered = (StatusCode, &'static str, String);

fn internal() -> Rendered {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.render();
        let body = json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}

impl AppError {
    fn render(&self) -> Rendered {
        match self {
            AppError::Core(core) => render_core_error(core),
            AppError::Database(err) => render_sqlx_error(err),
            AppError::Fal(err) => render_fal_error(err),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        }
    }
}

fn render_core_error(err: &CoreError) -> Rendered {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => {
            (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
        }
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

/// Missing rows are 404; a violated `uq_`-named unique constraint
/// (Postgres error 23505) is 409. Anything else is logged and
/// sanitized to a 500.
fn render_sqlx_error(err: &sqlx::Error) -> Rendered {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Duplicate value violates unique constraint: {constraint}"),
                )
            } else {
                tracing::error!(error = %db_err, "Database error");
                internal()
            }
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}

/// A missing credential is a service-level misconfiguration (503); a
/// rejected or unreachable submission is an upstream failure (502).
fn render_fal_error(err: &FalError) -> Rendered {
    match err {
        FalError::Unconfigured => (
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "FAL API key not configured".to_string(),
        ),
        FalError::Request(e) => {
            tracing::error!(error = %e, "fal.ai request failed");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "Failed to submit job to AI service".to_string(),
            )
        }
        FalError::Api { status, body } => {
            tracing::error!(status, body = %body, "fal.ai rejected request");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "Failed to submit job to AI service".to_string(),
            )
        }
    }
}
