//! Repository for the `jobs` table.
//!
//! All mutations are primary-key-qualified single-row updates. The
//! background monitor and the on-demand status check may both write
//! the same row; last-writer-wins is acceptable because both derive
//! their state from the same upstream source of truth.

use sqlx::PgPool;
use pixelsmith_core::types::DbId;

use crate::models::job::{CreateJob, Job, JobListQuery};
use crate::models::status::JobStatus;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, prompt, image_url, result_url, status_id, application, \
    fal_request_id, owner_id, strength, created_at, updated_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 20;

/// Provides CRUD operations for generation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new job in `pending` status. Returns the created row.
    pub async fn create(pool: &PgPool, input: &CreateJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs \
                 (prompt, image_url, status_id, application, fal_request_id, \
                  owner_id, strength) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&input.prompt)
            .bind(&input.image_url)
            .bind(JobStatus::Pending.id())
            .bind(&input.application)
            .bind(&input.fal_request_id)
            .bind(input.owner_id)
            .bind(input.strength)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID, regardless of owner. Used by the
    /// background monitor, which is keyed by job id alone.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job by ID, scoped to its owner.
    ///
    /// Filters on both `id` and `owner_id` in a single query so
    /// another user's job is indistinguishable from a missing one.
    pub async fn find_by_id_for_owner(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite a job's status.
    pub async fn update_status(
        pool: &PgPool,
        job_id: DbId,
        status: JobStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET status_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(job_id)
            .bind(status.id())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Mark a job as completed with its result URL.
    pub async fn complete(
        pool: &PgPool,
        job_id: DbId,
        result_url: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, result_url = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobStatus::Completed.id())
        .bind(result_url)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job as failed.
    ///
    /// Clears `result_url` so a row can never read as failed-with-result.
    pub async fn fail(pool: &PgPool, job_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, result_url = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List a user's jobs, newest first, with page/limit pagination.
    ///
    /// `page` is 1-based and clamped to >= 1; `limit` defaults to 20
    /// and is capped at 100. The offset is computed with saturating
    /// arithmetic so an absurdly large page number yields an empty
    /// page, not an overflow.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
        params: &JobListQuery,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let page = params.page.unwrap_or(1).max(1);
        let offset = page.saturating_sub(1).saturating_mul(limit);

        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
