//! Tests driving the background job monitor loop directly against a
//! real database and a scripted inference service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ScriptedFal;
use sqlx::PgPool;

use pixelsmith_api::background::job_monitor;
use pixelsmith_api::config::MonitorConfig;
use pixelsmith_core::types::DbId;
use pixelsmith_db::models::job::{CreateJob, Job};
use pixelsmith_db::models::status::JobStatus;
use pixelsmith_db::models::user::CreateUser;
use pixelsmith_db::repositories::{JobRepo, UserRepo};
use pixelsmith_fal::client::TEXT_TO_IMAGE_ENDPOINT;
use pixelsmith_fal::PollOutcome;

fn fast_config(max_attempts: u32) -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::from_millis(1),
        max_attempts,
    }
}

async fn insert_job(pool: &PgPool, request_id: &str) -> DbId {
    let user = UserRepo::create(
        pool,
        &CreateUser {
            email: format!("{request_id}@example.com"),
            password_hash: "irrelevant".to_string(),
        },
    )
    .await
    .unwrap();

    let job = JobRepo::create(
        pool,
        &CreateJob {
            prompt: "an origami crane made of circuit boards".to_string(),
            image_url: None,
            application: TEXT_TO_IMAGE_ENDPOINT.to_string(),
            fal_request_id: request_id.to_string(),
            owner_id: user.id,
            strength: None,
        },
    )
    .await
    .unwrap();
    job.id
}

async fn load_job(pool: &PgPool, job_id: DbId) -> Job {
    JobRepo::find_by_id(pool, job_id).await.unwrap().unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn monitor_walks_job_through_to_completion(pool: PgPool) {
    let job_id = insert_job(&pool, "req-mon-1").await;

    let fal = Arc::new(
        ScriptedFal::new(PollOutcome::Unknown).with_script(vec![
            PollOutcome::Queued,
            PollOutcome::Processing,
            PollOutcome::Completed {
                result_url: Some("https://cdn.example.com/crane.jpg".to_string()),
            },
        ]),
    );

    job_monitor::run(
        pool.clone(),
        fal.clone(),
        fast_config(10),
        job_id,
        "req-mon-1",
        TEXT_TO_IMAGE_ENDPOINT,
    )
    .await;

    let job = load_job(&pool, job_id).await;
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(
        job.result_url.as_deref(),
        Some("https://cdn.example.com/crane.jpg")
    );

    // The loop stops on the first terminal outcome.
    assert_eq!(fal.poll_count(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn monitor_marks_resultless_completion_as_failed(pool: PgPool) {
    let job_id = insert_job(&pool, "req-mon-2").await;

    let fal = Arc::new(
        ScriptedFal::new(PollOutcome::Unknown)
            .with_script(vec![PollOutcome::Completed { result_url: None }]),
    );

    job_monitor::run(
        pool.clone(),
        fal,
        fast_config(10),
        job_id,
        "req-mon-2",
        TEXT_TO_IMAGE_ENDPOINT,
    )
    .await;

    let job = load_job(&pool, job_id).await;
    assert_eq!(job.status(), JobStatus::Failed);
    assert!(job.result_url.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn monitor_records_upstream_failure(pool: PgPool) {
    let job_id = insert_job(&pool, "req-mon-3").await;

    let fal = Arc::new(
        ScriptedFal::new(PollOutcome::Unknown)
            .with_script(vec![PollOutcome::Processing, PollOutcome::Failed]),
    );

    job_monitor::run(
        pool.clone(),
        fal,
        fast_config(10),
        job_id,
        "req-mon-3",
        TEXT_TO_IMAGE_ENDPOINT,
    )
    .await;

    let job = load_job(&pool, job_id).await;
    assert_eq!(job.status(), JobStatus::Failed);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn exhausted_monitor_leaves_last_observed_status(pool: PgPool) {
    let job_id = insert_job(&pool, "req-mon-4").await;

    // Upstream reports processing forever; the monitor must give up
    // after its attempt ceiling without forcing a terminal state.
    let fal = Arc::new(ScriptedFal::new(PollOutcome::Processing));

    job_monitor::run(
        pool.clone(),
        fal.clone(),
        fast_config(3),
        job_id,
        "req-mon-4",
        TEXT_TO_IMAGE_ENDPOINT,
    )
    .await;

    assert_eq!(fal.poll_count(), 3);
    let job = load_job(&pool, job_id).await;
    assert_eq!(job.status(), JobStatus::Processing);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn exhausted_monitor_returns_without_a_trailing_wait(pool: PgPool) {
    let job_id = insert_job(&pool, "req-mon-7").await;

    let fal = Arc::new(ScriptedFal::new(PollOutcome::Processing));

    // A single attempt with a long interval: the run must come back
    // immediately after that attempt instead of sleeping first.
    let config = MonitorConfig {
        poll_interval: Duration::from_secs(60),
        max_attempts: 1,
    };

    let run = job_monitor::run(
        pool.clone(),
        fal.clone(),
        config,
        job_id,
        "req-mon-7",
        TEXT_TO_IMAGE_ENDPOINT,
    );
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("exhausted monitor should return promptly");

    assert_eq!(fal.poll_count(), 1);
    let job = load_job(&pool, job_id).await;
    assert_eq!(job.status(), JobStatus::Processing);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn undetermined_polls_leave_status_untouched_until_resolved(pool: PgPool) {
    let job_id = insert_job(&pool, "req-mon-5").await;

    let fal = Arc::new(ScriptedFal::new(PollOutcome::Unknown).with_script(vec![
        PollOutcome::Unknown,
        PollOutcome::Unknown,
        PollOutcome::Completed {
            result_url: Some("https://cdn.example.com/late.jpg".to_string()),
        },
    ]));

    job_monitor::run(
        pool.clone(),
        fal,
        fast_config(10),
        job_id,
        "req-mon-5",
        TEXT_TO_IMAGE_ENDPOINT,
    )
    .await;

    let job = load_job(&pool, job_id).await;
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(
        job.result_url.as_deref(),
        Some("https://cdn.example.com/late.jpg")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn apply_outcome_ignores_unknown(pool: PgPool) {
    let job_id = insert_job(&pool, "req-mon-6").await;
    JobRepo::update_status(&pool, job_id, JobStatus::Processing)
        .await
        .unwrap();

    let written = job_monitor::apply_outcome(&pool, job_id, &PollOutcome::Unknown)
        .await
        .unwrap();

    assert!(written.is_none());
    let job = load_job(&pool, job_id).await;
    assert_eq!(job.status(), JobStatus::Processing);
}
