//! Job entity models and DTOs for image generation requests.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use pixelsmith_core::types::{DbId, Timestamp};

use super::status::{JobStatus, StatusId};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct Job {
    pub id: DbId,
    pub prompt: String,
    /// Original upload, stored as a base64 data URI. `None` for
    /// text-to-image jobs.
    pub image_url: Option<String>,
    /// Set by reconciliation once the upstream job completes.
    pub result_url: Option<String>,
    pub status_id: StatusId,
    /// Upstream endpoint the job was submitted to (text-to-image or
    /// image-to-image).
    pub application: String,
    /// Request id assigned by the inference service at submission.
    pub fal_request_id: String,
    pub owner_id: DbId,
    /// Edit strength, only meaningful for image-to-image jobs.
    pub strength: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Decode the stored status id. Falls back to `Failed` if the row
    /// somehow carries an id outside the known range.
    pub fn status(&self) -> JobStatus {
        JobStatus::from_id(self.status_id).unwrap_or(JobStatus::Failed)
    }
}

/// External-facing job representation with a readable status name.
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub id: DbId,
    pub prompt: String,
    pub image_url: Option<String>,
    pub result_url: Option<String>,
    pub status: &'static str,
    pub application: String,
    pub fal_request_id: String,
    pub owner_id: DbId,
    pub strength: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        let status = job.status().as_str();
        Self {
            id: job.id,
            prompt: job.prompt,
            image_url: job.image_url,
            result_url: job.result_url,
            status,
            application: job.application,
            fal_request_id: job.fal_request_id,
            owner_id: job.owner_id,
            strength: job.strength,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// DTO for inserting a new job row after a successful submission.
#[derive(Debug)]
pub struct CreateJob {
    pub prompt: String,
    pub image_url: Option<String>,
    pub application: String,
    pub fal_request_id: String,
    pub owner_id: DbId,
    pub strength: Option<f64>,
}

/// Query parameters for `GET /api/jobs`.
#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    /// 1-based page number. Defaults to 1.
    pub page: Option<i64>,
    /// Page size. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
}
