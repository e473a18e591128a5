//! Route definitions for the `/jobs` resource.
//!
//! All endpoints require authentication.

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Body limit for job creation: a 10 MB image plus form fields and
/// multipart framing. Oversized images inside this envelope still get
/// the descriptive validation error rather than a bare 413.
const UPLOAD_BODY_LIMIT: usize = 12 * 1024 * 1024;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /              -> list_jobs
/// POST   /              -> create_job (multipart)
/// GET    /{id}          -> get_job
/// GET    /{id}/status   -> check_job_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/status", get(jobs::check_job_status))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}
