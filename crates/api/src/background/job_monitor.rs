//! Per-job background monitor driving a submitted job to a terminal state.
//!
//! Each job gets its own independent tokio task, spawned at creation
//! time. The task polls the inference service on a fixed cadence,
//! persists every reported state change immediately, and stops once
//! the job is completed or failed, or once the attempt ceiling is
//! reached. Tasks for different jobs never interact; the only shared
//! state is the database, and every write is a primary-key-qualified
//! update on this task's own job row.
//!
//! Transient upstream failures are absorbed: a poll that cannot
//! determine the status counts as an attempt and is retried on the
//! next cycle. They never propagate to any request handler.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use pixelsmith_core::types::DbId;
use pixelsmith_db::models::status::JobStatus;
use pixelsmith_db::repositories::JobRepo;
use pixelsmith_fal::{InferenceService, PollOutcome};

use crate::config::MonitorConfig;

/// Spawn the monitor task for a freshly created job.
///
/// Returns the join handle; the caller (the create-job handler) drops
/// it, letting the task run detached until it terminates on its own.
pub fn spawn(
    pool: PgPool,
    fal: Arc<dyn InferenceService>,
    config: MonitorConfig,
    job_id: DbId,
    request_id: String,
    application: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run(pool, fal, config, job_id, &request_id, &application).await;
    })
}

/// Poll one job until it reaches a terminal state or the attempt
/// ceiling is exhausted.
///
/// On ceiling exhaustion the job is left in its last observed
/// non-terminal status and the monitor stops; nothing re-polls it
/// afterwards. A warning is logged so the condition is visible.
pub async fn run(
    pool: PgPool,
    fal: Arc<dyn InferenceService>,
    config: MonitorConfig,
    job_id: DbId,
    request_id: &str,
    application: &str,
) {
    tracing::debug!(job_id, request_id, "Job monitor started");

    for attempt in 1..=config.max_attempts {
        let outcome = fal.poll_status(request_id, application).await;

        match apply_outcome(&pool, job_id, &outcome).await {
            Ok(Some(status)) => {
                tracing::debug!(
                    job_id,
                    attempt,
                    status = status.as_str(),
                    "Job status updated",
                );
                if status.is_terminal() {
                    tracing::info!(
                        job_id,
                        status = status.as_str(),
                        "Job finished; monitor stopping",
                    );
                    return;
                }
            }
            Ok(None) => {
                tracing::debug!(job_id, attempt, "Job status undetermined this cycle");
            }
            Err(e) => {
                // The row write failed; the next cycle re-derives the
                // same state from upstream, so just retry.
                tracing::error!(job_id, attempt, error = %e, "Failed to persist job status");
            }
        }

        // No wait after the last attempt; the loop is done either way.
        if attempt < config.max_attempts {
            tokio::time::sleep(config.poll_interval).await;
        }
    }

    tracing::warn!(
        job_id,
        max_attempts = config.max_attempts,
        "Job monitor gave up before a terminal state; job keeps its last observed status",
    );
}

/// Persist a poll outcome to the job row.
///
/// Returns the status that was written, or `None` when the outcome was
/// `Unknown` (nothing is written; the previous status stands). A
/// completed report with no result URL is stored as `Failed` --
/// result-less completion is not a valid terminal state.
///
/// Shared by the background monitor and the on-demand status check so
/// both reconcile identically.
pub async fn apply_outcome(
    pool: &PgPool,
    job_id: DbId,
    outcome: &PollOutcome,
) -> Result<Option<JobStatus>, sqlx::Error> {
    let status = match outcome {
        PollOutcome::Queued => {
            JobRepo::update_status(pool, job_id, JobStatus::Queued).await?;
            JobStatus::Queued
        }
        PollOutcome::Processing => {
            JobRepo::update_status(pool, job_id, JobStatus::Processing).await?;
            JobStatus::Processing
        }
        PollOutcome::Completed {
            result_url: Some(url),
        } => {
            JobRepo::complete(pool, job_id, url).await?;
            JobStatus::Completed
        }
        PollOutcome::Completed { result_url: None } => {
            tracing::warn!(job_id, "Job completed without a result; recording as failed");
            JobRepo::fail(pool, job_id).await?;
            JobStatus::Failed
        }
        PollOutcome::Failed => {
            JobRepo::fail(pool, job_id).await?;
            JobStatus::Failed
        }
        PollOutcome::Unknown => return Ok(None),
    };

    Ok(Some(status))
}
