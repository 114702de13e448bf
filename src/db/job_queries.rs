use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::job::{Job, JobStatus};

const JOB_COLUMNS: &str =
    "id, owner_user_id, job_type, input, status, result, error, created_at, updated_at";

fn job_from_row(row: &PgRow) -> Result<Job, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status: JobStatus = status_str
        .parse()
        .map_err(|_| sqlx::Error::Decode(format!("unknown job status '{status_str}'").into()))?;

    Ok(Job {
        id: row.try_get("id")?,
        owner_user_id: row.try_get("owner_user_id")?,
        job_type: row.try_get("job_type")?,
        input: row.try_get("input")?,
        status,
        result: row.try_get("result")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert a new job in `queued`. Clients normally create jobs through their
/// own data layer; this exists for the sweeper's tests and live tests.
pub async fn create_job(
    pool: &PgPool,
    owner_user_id: Uuid,
    job_type: &str,
    input: &serde_json::Value,
) -> Result<Job, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO ai_jobs (owner_user_id, job_type, input, status)
        VALUES ($1, $2, $3, 'queued')
        RETURNING {JOB_COLUMNS}
        "#,
    ))
    .bind(owner_user_id)
    .bind(job_type)
    .bind(input)
    .fetch_one(pool)
    .await?;

    job_from_row(&row)
}

/// Get a job by id regardless of owner (poller/store read path).
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM ai_jobs WHERE id = $1",
    ))
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Get a job scoped to its owner.
pub async fn get_job_for_owner(
    pool: &PgPool,
    job_id: Uuid,
    owner_user_id: Uuid,
) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM ai_jobs WHERE id = $1 AND owner_user_id = $2",
    ))
    .bind(job_id)
    .bind(owner_user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Outcome of a claim attempt. A job is claimable exactly once: the CAS
/// below admits only the `queued -> running` transition.
#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed(Job),
    /// Absent, or owned by another user.
    Missing,
    /// Exists for this owner but is not `queued` (running or terminal).
    NotClaimable(JobStatus),
}

/// Atomically transition a job from `queued` to `running` for its owner.
pub async fn claim_job(
    pool: &PgPool,
    job_id: Uuid,
    owner_user_id: Uuid,
) -> Result<ClaimOutcome, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE ai_jobs
        SET status = 'running', updated_at = NOW()
        WHERE id = $1 AND owner_user_id = $2 AND status = 'queued'
        RETURNING {JOB_COLUMNS}
        "#,
    ))
    .bind(job_id)
    .bind(owner_user_id)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        return Ok(ClaimOutcome::Claimed(job_from_row(&row)?));
    }

    // The CAS missed: distinguish a missing/foreign job from one that is
    // already past `queued`.
    match get_job_for_owner(pool, job_id, owner_user_id).await? {
        Some(job) => Ok(ClaimOutcome::NotClaimable(job.status)),
        None => Ok(ClaimOutcome::Missing),
    }
}

/// Write a provisional result while the job is still `running`. The status
/// guard means a partial can never land after the terminal write; returns
/// whether a row was updated.
pub async fn write_partial_result(
    pool: &PgPool,
    job_id: Uuid,
    result: &serde_json::Value,
) -> Result<bool, sqlx::Error> {
    let done = sqlx::query(
        r#"
        UPDATE ai_jobs
        SET result = $1, updated_at = NOW()
        WHERE id = $2 AND status = 'running'
        "#,
    )
    .bind(result)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(done.rows_affected() > 0)
}

/// Terminal success write: the last mutation a dispatch performs.
pub async fn complete_job(
    pool: &PgPool,
    job_id: Uuid,
    result: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE ai_jobs
        SET status = 'succeeded', result = $1, error = NULL, updated_at = NOW()
        WHERE id = $2 AND status = 'running'
        "#,
    )
    .bind(result)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Terminal failure write. The error message is stored verbatim.
pub async fn fail_job(pool: &PgPool, job_id: Uuid, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE ai_jobs
        SET status = 'failed', error = $1, updated_at = NOW()
        WHERE id = $2 AND status IN ('queued', 'running')
        "#,
    )
    .bind(error)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Queued jobs older than `min_age_secs`: trigger calls that never made it.
pub async fn list_stranded_queued(
    pool: &PgPool,
    min_age_secs: i64,
    limit: i64,
) -> Result<Vec<Job>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM ai_jobs
        WHERE status = 'queued' AND created_at < NOW() - make_interval(secs => $1)
        ORDER BY created_at ASC
        LIMIT $2
        "#,
    ))
    .bind(min_age_secs as f64)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Count of `running` jobs older than `age_secs`. There is no reaper for
/// these (a crashed handler leaves the row unclaimable); the sweeper only
/// surfaces the count so operators see the gap.
pub async fn count_stale_running(pool: &PgPool, age_secs: i64) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS n
        FROM ai_jobs
        WHERE status = 'running' AND updated_at < NOW() - make_interval(secs => $1)
        "#,
    )
    .bind(age_secs as f64)
    .fetch_one(pool)
    .await?;

    row.try_get("n")
}

/// Current number of queued jobs (for the queue-depth gauge).
pub async fn queued_depth(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM ai_jobs WHERE status = 'queued'")
        .fetch_one(pool)
        .await?;

    row.try_get("n")
}
