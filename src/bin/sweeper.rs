use wardrobe_ai::{
    app_state::AppState,
    config::{AppConfig, ModelConfig},
    db::{self, job_queries},
    services::{
        auth::TokenVerifier, dispatcher, genai::GenAiClient, storage::MediaStore,
    },
};
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

/// Queued jobs swept per scan.
const SWEEP_BATCH: i64 = 10;

/// Age past which a `running` job is reported as possibly stuck. There is
/// deliberately no reaper: a crashed handler leaves the row unclaimable,
/// and that gap is surfaced to operators instead of being papered over.
const STALE_RUNNING_SECS: i64 = 3600;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting AI job sweeper");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    tracing::info!("Initializing services");
    let storage = MediaStore::new(
        &config.media_bucket,
        &config.media_endpoint,
        &config.media_access_key,
        &config.media_secret_key,
    )
    .expect("Failed to initialize media store client");

    let genai = GenAiClient::new(&config.genai_base_url, &config.genai_api_key);
    let auth = TokenVerifier::new(&config.jwt_secret);
    let models = ModelConfig::from_app(&config);

    let state = AppState::new(db_pool, storage, genai, auth, models);

    let interval = Duration::from_secs(config.sweep_interval_secs);
    let min_age = config.sweep_min_age_secs;

    tracing::info!(
        interval_secs = config.sweep_interval_secs,
        min_age_secs = min_age,
        "Sweeper ready"
    );

    loop {
        match sweep_once(&state, min_age).await {
            Ok(0) => {
                tracing::trace!("No stranded jobs, sleeping");
            }
            Ok(n) => {
                tracing::info!(dispatched = n, "Sweep pass complete");
            }
            Err(e) => {
                tracing::error!(error = %e, "Sweep pass failed, will retry");
            }
        }
        sleep(interval).await;
    }
}

/// Dispatch queued jobs whose trigger call apparently never arrived.
/// Returns the number of jobs dispatched.
async fn sweep_once(state: &AppState, min_age_secs: i64) -> Result<usize, sqlx::Error> {
    if let Ok(depth) = job_queries::queued_depth(&state.db).await {
        metrics::gauge!("ai_jobs_queued_depth").set(depth as f64);
    }

    let stale_running = job_queries::count_stale_running(&state.db, STALE_RUNNING_SECS).await?;
    if stale_running > 0 {
        tracing::warn!(
            count = stale_running,
            age_secs = STALE_RUNNING_SECS,
            "Jobs stuck in running; no reaper policy exists for these"
        );
    }

    let stranded = job_queries::list_stranded_queued(&state.db, min_age_secs, SWEEP_BATCH).await?;
    let mut dispatched = 0;

    for job in stranded {
        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            "Sweeping stranded queued job"
        );

        // The claim inside dispatch_for keeps this race-safe: a job picked
        // up by a live trigger in the meantime is skipped with a conflict.
        match dispatcher::dispatch_for(state, job.id, job.owner_user_id).await {
            Ok(_) => dispatched += 1,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Sweep dispatch did not succeed");
            }
        }
    }

    Ok(dispatched)
}
