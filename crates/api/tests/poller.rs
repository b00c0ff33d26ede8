//! Integration tests for the status poller: terminal convergence,
//! refund policy, timeout, idempotent attach, detach, and restart
//! resume.

mod common;

use std::time::Duration;

use chrono::Utc;
use common::{balance, seed_credits, MockProvider};
use minimuse_core::input::{
    BabyGender, BabyImageInput, GenerationInput, MediaRef,
};
use minimuse_core::tool::ToolKind;
use minimuse_core::types::DbId;
use minimuse_db::models::job::Job;
use minimuse_db::models::status::JobStatus;
use minimuse_db::repositories::JobRepo;
use minimuse_provider::TaskState;
use sqlx::PgPool;

const USER: DbId = 31;

fn baby_image_input() -> GenerationInput {
    let photo = MediaRef {
        url: "https://cdn.example.com/uploads/photo.jpg".into(),
        content_type: "image/jpeg".into(),
        size_bytes: 500_000,
    };
    GenerationInput::BabyImage(BabyImageInput {
        mother_photo: photo.clone(),
        father_photo: photo,
        gender: BabyGender::Surprise,
    })
}

/// Create a job row directly (bypassing the engine) with a provider ref
/// attached, as if the process had restarted mid-flight.
async fn seeded_job(pool: &PgPool, user_id: DbId, tool: ToolKind, deadline: chrono::Duration) -> Job {
    let input = serde_json::json!({ "tool": tool.slug(), "input": {} });
    let job = JobRepo::create(pool, user_id, tool, &input, 5, Utc::now() + deadline)
        .await
        .unwrap();
    JobRepo::set_provider_ref(pool, job.id, &format!("task-seed-{}", job.id))
        .await
        .unwrap();
    JobRepo::find_by_id(pool, job.id).await.unwrap().unwrap()
}

/// Poll the store until the job reaches `expected` (or fail after 5s).
async fn wait_for_status(pool: &PgPool, job_id: DbId, expected: JobStatus) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = JobRepo::find_by_id(pool, job_id).await.unwrap().unwrap();
        if job.status() == Some(expected) {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {job_id} did not reach {expected:?}, stuck at {:?}",
            job.status(),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

// ---------------------------------------------------------------------------
// Terminal convergence
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn poller_resolves_completed_job(pool: PgPool) {
    let provider = MockProvider::new();
    provider.set_status(
        TaskState::Succeeded,
        Some("https://cdn.example.com/baby.png"),
        None,
    );
    let (_app, engine) = common::build_test_app(pool.clone(), provider.clone());
    seed_credits(&pool, USER, 10).await;

    let job = engine.submit(USER, baby_image_input()).await.unwrap();

    let job = wait_for_status(&pool, job.id, JobStatus::Completed).await;
    assert_eq!(job.result_uri.as_deref(), Some("https://cdn.example.com/baby.png"));
    assert!(job.completed_at.is_some());

    // Success consumes the reservation: 10 - 2, no refund.
    assert_eq!(balance(&pool, USER).await, 8);
    assert!(!job.credits_refunded);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn poller_resolves_failed_job_and_refunds(pool: PgPool) {
    let provider = MockProvider::new();
    provider.set_status(TaskState::Failed, None, Some("faces not detected"));
    let (_app, engine) = common::build_test_app(pool.clone(), provider.clone());
    seed_credits(&pool, USER, 10).await;

    let job = engine.submit(USER, baby_image_input()).await.unwrap();

    let job = wait_for_status(&pool, job.id, JobStatus::Failed).await;
    assert_eq!(job.error_message.as_deref(), Some("faces not detected"));
    assert!(job.result_uri.is_none());

    // Provider failure refunds the reservation.
    assert_eq!(balance(&pool, USER).await, 10);
    assert!(job.credits_refunded);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn poller_marks_processing_on_provider_progress(pool: PgPool) {
    let provider = MockProvider::new();
    let (_app, engine) = common::build_test_app(pool.clone(), provider.clone());
    seed_credits(&pool, USER, 10).await;

    let job = engine.submit(USER, baby_image_input()).await.unwrap();
    assert_eq!(job.status(), Some(JobStatus::Queued));

    // Default mock state is `processing`; the first tick moves the job.
    wait_for_status(&pool, job.id, JobStatus::Processing).await;
}

// ---------------------------------------------------------------------------
// Timeout
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn poller_times_out_job_past_deadline(pool: PgPool) {
    let provider = MockProvider::new();
    let (_app, engine) = common::build_test_app(pool.clone(), provider.clone());
    seed_credits(&pool, USER, 10).await;

    // A job whose deadline has already passed.
    let job = seeded_job(&pool, USER, ToolKind::BabyImage, chrono::Duration::seconds(-1)).await;
    engine.pollers().ensure_polling(&job).await;

    let job = wait_for_status(&pool, job.id, JobStatus::TimedOut).await;

    // A local timeout is not a provider failure: no error message, and
    // the reservation is kept because the provider may still deliver.
    assert!(job.error_message.is_none());
    assert!(!job.credits_refunded);
    assert_eq!(balance(&pool, USER).await, 10);

    // The single-flight lock is released: a new submit is accepted.
    engine.submit(USER, baby_image_input()).await.unwrap();
}

// ---------------------------------------------------------------------------
// Idempotent attach / detach / resume
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn ensure_polling_is_idempotent(pool: PgPool) {
    let provider = MockProvider::new();
    let (_app, engine) = common::build_test_app(pool.clone(), provider.clone());

    // TextToVideo polls every 15s, so within this test only the
    // immediate first tick can fire.
    let job = seeded_job(&pool, USER, ToolKind::TextToVideo, chrono::Duration::minutes(10)).await;

    assert!(engine.pollers().ensure_polling(&job).await);
    assert!(!engine.pollers().ensure_polling(&job).await);
    assert_eq!(engine.pollers().active_count().await, 1);

    // One poller, one immediate tick: a duplicate poller would have
    // doubled the status-query count.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(provider.status_count(), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn resolve_pending_reattaches_exactly_one_poller(pool: PgPool) {
    let provider = MockProvider::new();
    let (_app, engine) = common::build_test_app(pool.clone(), provider.clone());

    let job = seeded_job(&pool, USER, ToolKind::TextToVideo, chrono::Duration::minutes(10)).await;

    // Two resolver calls in a row: same job, one poller.
    let first = engine.resolve_pending(USER, ToolKind::TextToVideo).await.unwrap();
    let second = engine.resolve_pending(USER, ToolKind::TextToVideo).await.unwrap();
    assert_eq!(first.unwrap().id, job.id);
    assert_eq!(second.unwrap().id, job.id);
    assert_eq!(engine.pollers().active_count().await, 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(provider.status_count(), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn detach_stops_polling_without_touching_the_store(pool: PgPool) {
    let provider = MockProvider::new();
    let (_app, engine) = common::build_test_app(pool.clone(), provider.clone());

    let job = seeded_job(&pool, USER, ToolKind::TextToVideo, chrono::Duration::minutes(10)).await;
    engine.pollers().ensure_polling(&job).await;

    engine.pollers().detach(job.id).await;
    assert_eq!(engine.pollers().active_count().await, 0);

    // The job is still active server-side and can be re-attached later.
    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert!(job.is_active());
    assert!(engine.pollers().ensure_polling(&job).await);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn resume_all_reattaches_pollable_jobs(pool: PgPool) {
    let provider = MockProvider::new();
    let (_app, engine) = common::build_test_app(pool.clone(), provider.clone());

    seeded_job(&pool, USER, ToolKind::TextToVideo, chrono::Duration::minutes(10)).await;
    seeded_job(&pool, USER, ToolKind::LipSync, chrono::Duration::minutes(8)).await;

    // A job that never got a provider ref (crash between insert and
    // provider submit) cannot be polled; the sweep owns it.
    let input = serde_json::json!({});
    JobRepo::create(
        &pool,
        USER,
        ToolKind::EarthZoom,
        &input,
        5,
        Utc::now() + chrono::Duration::minutes(6),
    )
    .await
    .unwrap();

    assert_eq!(engine.resume_all().await, 2);
    assert_eq!(engine.pollers().active_count().await, 2);
}
