//! Handlers for the `/jobs` resource.
//!
//! All endpoints require authentication via [`AuthUser`] and are
//! owner-scoped: a job that exists but belongs to another user is
//! reported as not found.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use serde::Serialize;

use pixelsmith_core::error::CoreError;
use pixelsmith_core::image::validate_upload;
use pixelsmith_core::types::DbId;
use pixelsmith_db::models::job::{CreateJob, Job, JobListQuery, JobResponse};
use pixelsmith_db::models::status::JobStatus;
use pixelsmith_db::repositories::JobRepo;

use crate::background::job_monitor;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Default edit strength when the form omits it for image-to-image jobs.
const DEFAULT_STRENGTH: f64 = 0.7;

// ---------------------------------------------------------------------------
// Multipart form parsing
// ---------------------------------------------------------------------------

/// Parsed fields of the job creation form.
struct CreateJobForm {
    prompt: String,
    strength: Option<f64>,
    image: Option<UploadedImage>,
}

struct UploadedImage {
    bytes: Vec<u8>,
    content_type: String,
}

/// Read the `prompt`, `strength`, and `image` fields out of the
/// multipart body. Unknown fields are ignored.
async fn parse_create_job_form(mut multipart: Multipart) -> AppResult<CreateJobForm> {
    let mut prompt: Option<String> = None;
    let mut strength: Option<f64> = None;
    let mut image: Option<UploadedImage> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("prompt") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid prompt field: {e}")))?;
                prompt = Some(text);
            }
            Some("strength") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid strength field: {e}")))?;
                let value: f64 = text.parse().map_err(|_| {
                    AppError::BadRequest("strength must be a number".to_string())
                })?;
                strength = Some(value);
            }
            Some("image") => {
                // An empty file input submits a field with no filename;
                // treat it the same as no image at all.
                if field.file_name().map_or(true, str::is_empty) {
                    continue;
                }
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid image field: {e}")))?;
                image = Some(UploadedImage {
                    bytes: bytes.to_vec(),
                    content_type,
                });
            }
            _ => {}
        }
    }

    let prompt = prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("prompt is required".to_string()))?;

    Ok(CreateJobForm {
        prompt,
        strength,
        image,
    })
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/jobs
///
/// Validate the optional input image, submit the work to the inference
/// service, persist a `pending` job row, and spawn its background
/// monitor. Returns 201 with the created job immediately; the caller
/// never blocks on generation.
///
/// Validation failures reject the request before any external call or
/// database write, so no partial job rows exist for bad input.
pub async fn create_job(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let form = parse_create_job_form(multipart).await?;

    if let Some(image) = &form.image {
        validate_upload(&image.bytes, &image.content_type)
            .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;
    }

    let image_bytes = form.image.as_ref().map(|i| i.bytes.as_slice());
    let submission = state.fal.submit(&form.prompt, image_bytes).await?;

    // Keep the original upload alongside the job, inline as a data URI.
    let image_url = form.image.as_ref().map(|i| {
        format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&i.bytes)
        )
    });

    // Strength only means anything when there is an image to edit.
    let strength = form
        .image
        .is_some()
        .then(|| form.strength.unwrap_or(DEFAULT_STRENGTH));

    let job = JobRepo::create(
        &state.pool,
        &CreateJob {
            prompt: form.prompt,
            image_url,
            application: submission.application.clone(),
            fal_request_id: submission.request_id.clone(),
            owner_id: auth.user_id,
            strength,
        },
    )
    .await?;

    tracing::info!(
        job_id = job.id,
        application = %job.application,
        user_id = auth.user_id,
        "Job created",
    );

    // Fire-and-forget: the monitor outlives this request.
    let _handle = job_monitor::spawn(
        state.pool.clone(),
        state.fal.clone(),
        state.config.monitor.clone(),
        job.id,
        submission.request_id,
        submission.application,
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: JobResponse::from(job),
        }),
    ))
}

// ---------------------------------------------------------------------------
// On-demand status check
// ---------------------------------------------------------------------------

/// Status payload returned by `GET /api/jobs/{id}/status`.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: DbId,
    pub status: &'static str,
    pub fal_request_id: String,
    pub result_url: Option<String>,
}

/// GET /api/jobs/{id}/status
///
/// Return the stored status, re-verifying it against the inference
/// service first when the job is already believed complete. The
/// re-check applies the same completed-without-result -> failed rule
/// as the background monitor. Upstream poll failures are absorbed and
/// the stored status returned unchanged.
///
/// Jobs still in a non-terminal state are NOT reconciled here; their
/// background monitor owns them.
pub async fn check_job_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let mut job = find_owned_job(&state, job_id, &auth).await?;

    if job.status() == JobStatus::Completed {
        let outcome = state
            .fal
            .poll_status(&job.fal_request_id, &job.application)
            .await;

        if job_monitor::apply_outcome(&state.pool, job.id, &outcome)
            .await?
            .is_some()
        {
            // Re-read so the response reflects what was just stored.
            job = find_owned_job(&state, job_id, &auth).await?;
        }
    }

    let status = job.status().as_str();
    Ok(Json(DataResponse {
        data: JobStatusResponse {
            job_id: job.id,
            status,
            fal_request_id: job.fal_request_id,
            result_url: job.result_url,
        },
    }))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/jobs?page=&limit=
///
/// List the caller's jobs, newest first.
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list_by_owner(&state.pool, auth.user_id, &params).await?;
    let jobs: Vec<JobResponse> = jobs.into_iter().map(JobResponse::from).collect();

    Ok(Json(DataResponse { data: jobs }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/jobs/{id}
///
/// Get a single job. No reconciliation is triggered.
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_owned_job(&state, job_id, &auth).await?;
    Ok(Json(DataResponse {
        data: JobResponse::from(job),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a job scoped to the calling user.
///
/// Another user's job id produces the same `NotFound` as a missing
/// one, so nothing about existence leaks across owners.
async fn find_owned_job(state: &AppState, job_id: DbId, auth: &AuthUser) -> AppResult<Job> {
    JobRepo::find_by_id_for_owner(&state.pool, job_id, auth.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))
}
