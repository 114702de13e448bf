use std::time::Duration;

use uuid::Uuid;
use wardrobe_ai::{
    config::AppConfig,
    db::{self, job_queries},
    models::job::JobStatus,
    services::poller::{PgJobSource, Poller},
};

/// Integration tests for the job state machine against a live PostgreSQL.
///
/// Covered here:
/// 1. queued -> running -> succeeded, and that a running job rejects a
///    second claim
/// 2. partial result writes land only while running and survive a failure
/// 3. terminal writes are final (no backwards transitions)
/// 4. the poller reads terminal jobs straight from the store
///
/// Note: requires DATABASE_URL (and the rest of AppConfig) in the
/// environment. Run with: cargo test --test job_store_test -- --ignored

async fn test_pool() -> sqlx::PgPool {
    let config = AppConfig::from_env().expect("Failed to load config");
    let pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

#[tokio::test]
#[ignore]
async fn claim_is_exclusive_and_transitions_are_monotonic() {
    let pool = test_pool().await;
    let owner = Uuid::new_v4();

    // 1. Create a queued job
    let job = job_queries::create_job(
        &pool,
        owner,
        "product_shot",
        &serde_json::json!({ "image_id": Uuid::new_v4() }),
    )
    .await
    .expect("Failed to create job");
    assert_eq!(job.status, JobStatus::Queued);

    // 2. First claim wins
    let claimed = job_queries::claim_job(&pool, job.id, owner)
        .await
        .expect("Claim query failed");
    let claimed = match claimed {
        job_queries::ClaimOutcome::Claimed(j) => j,
        other => panic!("expected claim to succeed, got {other:?}"),
    };
    assert_eq!(claimed.status, JobStatus::Running);

    // 3. A second claim on a running job is rejected, regardless of caller
    let second = job_queries::claim_job(&pool, job.id, owner)
        .await
        .expect("Claim query failed");
    assert!(matches!(
        second,
        job_queries::ClaimOutcome::NotClaimable(JobStatus::Running)
    ));

    // 4. A foreign caller sees nothing at all
    let foreign = job_queries::claim_job(&pool, job.id, Uuid::new_v4())
        .await
        .expect("Claim query failed");
    assert!(matches!(foreign, job_queries::ClaimOutcome::Missing));

    // 5. Terminal write
    job_queries::complete_job(&pool, job.id, &serde_json::json!({ "ok": true }))
        .await
        .expect("Failed to complete job");

    let done = job_queries::get_job(&pool, job.id)
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(done.status, JobStatus::Succeeded);
    assert!(done.result.is_some());

    // 6. A terminal job is not claimable either
    let reclaim = job_queries::claim_job(&pool, job.id, owner)
        .await
        .expect("Claim query failed");
    assert!(matches!(
        reclaim,
        job_queries::ClaimOutcome::NotClaimable(JobStatus::Succeeded)
    ));

    // 7. A late failure write cannot move a succeeded job backwards
    job_queries::fail_job(&pool, job.id, "late failure")
        .await
        .expect("Fail query failed");
    let still_done = job_queries::get_job(&pool, job.id)
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(still_done.status, JobStatus::Succeeded);
    assert!(still_done.error.is_none());
}

#[tokio::test]
#[ignore]
async fn partial_result_survives_a_failed_terminal_write() {
    let pool = test_pool().await;
    let owner = Uuid::new_v4();

    let job = job_queries::create_job(
        &pool,
        owner,
        "wardrobe_item_generate",
        &serde_json::json!({ "item_id": Uuid::new_v4(), "image_id": Uuid::new_v4() }),
    )
    .await
    .expect("Failed to create job");

    // Partial writes require a running job
    let wrote = job_queries::write_partial_result(
        &pool,
        job.id,
        &serde_json::json!({ "image": { "image_id": Uuid::new_v4() } }),
    )
    .await
    .expect("Partial write query failed");
    assert!(!wrote, "partial write must not land on a queued job");

    let claimed = job_queries::claim_job(&pool, job.id, owner)
        .await
        .expect("Claim query failed");
    assert!(matches!(claimed, job_queries::ClaimOutcome::Claimed(_)));

    // The image branch publishes its pointer mid-flight
    let partial = serde_json::json!({ "image": { "image_id": Uuid::new_v4() } });
    let wrote = job_queries::write_partial_result(&pool, job.id, &partial)
        .await
        .expect("Partial write query failed");
    assert!(wrote);

    // The text branch then fails: the job is failed, not half-succeeded,
    // but the provisional result is still visible to pollers.
    job_queries::fail_job(&pool, job.id, "model returned malformed JSON: expected value")
        .await
        .expect("Fail query failed");

    let failed = job_queries::get_job(&pool, job.id)
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.result, Some(partial));
    assert_eq!(
        failed.error.as_deref(),
        Some("model returned malformed JSON: expected value")
    );

    // And no partial can land after the terminal write
    let late = job_queries::write_partial_result(&pool, job.id, &serde_json::json!({}))
        .await
        .expect("Partial write query failed");
    assert!(!late);
}

#[tokio::test]
#[ignore]
async fn poller_reads_terminal_jobs_from_the_store() {
    let pool = test_pool().await;
    let owner = Uuid::new_v4();

    let job = job_queries::create_job(&pool, owner, "auto_tag", &serde_json::json!({}))
        .await
        .expect("Failed to create job");

    let claimed = job_queries::claim_job(&pool, job.id, owner)
        .await
        .expect("Claim query failed");
    assert!(matches!(claimed, job_queries::ClaimOutcome::Claimed(_)));

    job_queries::complete_job(&pool, job.id, &serde_json::json!({ "attributes": {} }))
        .await
        .expect("Failed to complete job");

    let poller = Poller::new(PgJobSource::new(pool.clone()));
    let polled = poller
        .poll(job.id, 3, Duration::from_millis(100))
        .await
        .expect("Poll failed");

    assert_eq!(polled.status, JobStatus::Succeeded);
    assert!(polled.result.is_some());
}

#[tokio::test]
#[ignore]
async fn stranded_queued_jobs_are_listed_oldest_first() {
    let pool = test_pool().await;
    let owner = Uuid::new_v4();

    let job = job_queries::create_job(&pool, owner, "product_shot", &serde_json::json!({}))
        .await
        .expect("Failed to create job");

    // Immediately after creation the job is too fresh to count as stranded.
    let stranded = job_queries::list_stranded_queued(&pool, 3600, 100)
        .await
        .expect("Stranded query failed");
    assert!(stranded.iter().all(|j| j.id != job.id));

    // With no minimum age it shows up.
    let stranded = job_queries::list_stranded_queued(&pool, 0, 1000)
        .await
        .expect("Stranded query failed");
    assert!(stranded.iter().any(|j| j.id == job.id));
}
