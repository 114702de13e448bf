use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::job_queries::{self, ClaimOutcome};
use crate::models::job::{Job, JobStatus, JobType};
use crate::services::auth::AuthError;
use crate::services::compose::ComposeError;
use crate::services::genai::GenAiError;
use crate::services::handlers;
use crate::services::pipeline::PipelineError;

/// Externally triggered entry point: authenticate, claim, execute, persist.
pub async fn dispatch(
    state: &AppState,
    job_id: Uuid,
    authorization: Option<&str>,
) -> Result<serde_json::Value, JobError> {
    let caller = state.auth.caller_from_header(authorization)?;
    dispatch_for(state, job_id, caller).await
}

/// Post-auth dispatch path, also used by the sweeper on behalf of the
/// job's owner. Exactly one terminal write happens here; handlers may add
/// partial (non-status) writes before it.
pub async fn dispatch_for(
    state: &AppState,
    job_id: Uuid,
    caller: Uuid,
) -> Result<serde_json::Value, JobError> {
    metrics::counter!("ai_jobs_total").increment(1);
    let start = std::time::Instant::now();

    let job = match job_queries::claim_job(&state.db, job_id, caller).await? {
        ClaimOutcome::Claimed(job) => job,
        ClaimOutcome::Missing => return Err(JobError::NotFound),
        ClaimOutcome::NotClaimable(status) => return Err(JobError::Conflict(status)),
    };

    tracing::info!(job_id = %job.id, job_type = %job.job_type, "Executing AI job");

    match execute(state, &job).await {
        Ok(result) => {
            job_queries::complete_job(&state.db, job.id, &result).await?;

            metrics::counter!("ai_jobs_completed").increment(1);
            metrics::histogram!("ai_job_processing_seconds").record(start.elapsed().as_secs_f64());

            tracing::info!(
                job_id = %job.id,
                job_type = %job.job_type,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Job succeeded"
            );
            Ok(result)
        }
        Err(e) => {
            // The message reaches the job row verbatim; clients surface it.
            let message = e.to_string();
            if let Err(write_err) = job_queries::fail_job(&state.db, job.id, &message).await {
                tracing::error!(job_id = %job.id, error = %write_err, "Failed to persist job failure");
            }

            metrics::counter!("ai_jobs_failed").increment(1);
            tracing::error!(job_id = %job.id, job_type = %job.job_type, error = %message, "Job failed");
            Err(e)
        }
    }
}

/// Route a claimed job to its handler. The match is exhaustive; a stored
/// string outside the enumeration fails the job rather than no-opping.
async fn execute(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let job_type: JobType = job
        .job_type
        .parse()
        .map_err(|_| JobError::UnknownJobType(job.job_type.clone()))?;

    match job_type {
        JobType::AutoTag => handlers::tag::auto_tag(state, job).await,
        JobType::ProductShot => handlers::shots::product_shot(state, job).await,
        JobType::HeadshotGenerate => handlers::shots::headshot_generate(state, job).await,
        JobType::BodyShotGenerate => handlers::shots::body_shot_generate(state, job).await,
        JobType::OutfitSuggest => handlers::suggest::outfit_suggest(state, job).await,
        JobType::ReferenceMatch => handlers::reference::reference_match(state, job).await,
        JobType::OutfitMannequin => handlers::render::outfit_mannequin(state, job).await,
        JobType::OutfitRender => handlers::render::outfit_render(state, job).await,
        JobType::WardrobeItemGenerate => handlers::wardrobe_item::generate(state, job).await,
        JobType::WardrobeItemRender => handlers::wardrobe_item::render(state, job).await,
        JobType::WardrobeItemTag => handlers::wardrobe_item::tag(state, job).await,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("job not found")]
    NotFound,

    #[error("job is not claimable (status {0})")]
    Conflict(JobStatus),

    #[error("unknown job type '{0}'")]
    UnknownJobType(String),

    #[error("invalid job input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    GenAi(#[from] GenAiError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error("model returned malformed JSON: {0}")]
    Parse(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("background task failed: {0}")]
    Task(String),
}
