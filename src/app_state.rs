use sqlx::PgPool;
use std::sync::Arc;

use crate::config::ModelConfig;
use crate::services::{auth::TokenVerifier, genai::GenAiClient, storage::MediaStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub storage: Arc<MediaStore>,
    pub genai: Arc<GenAiClient>,
    pub auth: Arc<TokenVerifier>,
    /// Plain HTTP client for signed-URL blob fetches.
    pub http: reqwest::Client,
    pub models: ModelConfig,
}

impl AppState {
    pub fn new(
        db: PgPool,
        storage: MediaStore,
        genai: GenAiClient,
        auth: TokenVerifier,
        models: ModelConfig,
    ) -> Self {
        Self {
            db,
            storage: Arc::new(storage),
            genai: Arc::new(genai),
            auth: Arc::new(auth),
            http: reqwest::Client::new(),
            models,
        }
    }
}
