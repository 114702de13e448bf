mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::{AppConfig, ModelConfig};
use services::{auth::TokenVerifier, genai::GenAiClient, storage::MediaStore};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing wardrobe-ai job runner");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("ai_jobs_total", "Total AI job dispatches");
    metrics::describe_counter!("ai_jobs_completed", "AI jobs that reached succeeded");
    metrics::describe_counter!("ai_jobs_failed", "AI jobs that reached failed");
    metrics::describe_histogram!(
        "ai_job_processing_seconds",
        "Time from claim to terminal write for one job"
    );
    metrics::describe_gauge!(
        "ai_jobs_queued_depth",
        "Current number of queued jobs in the store"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize media store client
    tracing::info!("Initializing media store client");
    let storage = MediaStore::new(
        &config.media_bucket,
        &config.media_endpoint,
        &config.media_access_key,
        &config.media_secret_key,
    )
    .expect("Failed to initialize media store client");

    // Initialize generative API client
    tracing::info!("Initializing generative API client");
    let genai = GenAiClient::new(&config.genai_base_url, &config.genai_api_key);

    let auth = TokenVerifier::new(&config.jwt_secret);
    let models = ModelConfig::from_app(&config);

    // Create shared application state
    let state = AppState::new(db_pool, storage, genai, auth, models);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/ai-job-runner", post(routes::runner::run_job))
        .route("/ai-jobs/{job_id}", get(routes::runner::get_job_status))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(256 * 1024)); // job triggers are tiny

    tracing::info!("Starting wardrobe-ai on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
