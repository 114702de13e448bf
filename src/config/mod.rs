use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for the sweeper.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Secret for verifying client bearer tokens (HS256)
    pub jwt_secret: String,

    /// Generative API key
    pub genai_api_key: String,

    /// Generative API base URL
    #[serde(default = "default_genai_base_url")]
    pub genai_base_url: String,

    /// Standard-tier image model
    #[serde(default = "default_standard_model")]
    pub genai_standard_model: String,

    /// Pro-tier image model
    #[serde(default = "default_pro_model")]
    pub genai_pro_model: String,

    /// Fixed high-capability model used for the final outfit blend pass,
    /// regardless of the caller's tier
    #[serde(default = "default_compose_model")]
    pub genai_compose_model: String,

    /// Text model for tagging, suggestions and reference matching
    #[serde(default = "default_text_model")]
    pub genai_text_model: String,

    /// Max reference images per call on the standard model
    #[serde(default = "default_standard_capacity")]
    pub standard_model_capacity: usize,

    /// Max reference images per call on the pro model
    #[serde(default = "default_pro_capacity")]
    pub pro_model_capacity: usize,

    /// Media bucket name
    pub media_bucket: String,

    /// S3-compatible endpoint URL for the media bucket
    pub media_endpoint: String,

    /// Media store access key ID
    pub media_access_key: String,

    /// Media store secret access key
    pub media_secret_key: String,

    /// Seconds between sweeper scans for stranded queued jobs
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Minimum age in seconds before a queued job counts as stranded
    #[serde(default = "default_sweep_min_age_secs")]
    pub sweep_min_age_secs: i64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_genai_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_standard_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_pro_model() -> String {
    "gemini-2.5-pro-image".to_string()
}

fn default_compose_model() -> String {
    "gemini-2.5-pro-image".to_string()
}

fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_standard_capacity() -> usize {
    2
}

fn default_pro_capacity() -> usize {
    7
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_sweep_min_age_secs() -> i64 {
    60
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}

use crate::models::image::ModelTier;

/// Generation model names and per-model reference-image capacities,
/// resolved once at startup and shared with every handler.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub standard_model: String,
    pub pro_model: String,
    pub compose_model: String,
    pub text_model: String,
    pub standard_capacity: usize,
    pub pro_capacity: usize,
}

impl ModelConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            standard_model: config.genai_standard_model.clone(),
            pro_model: config.genai_pro_model.clone(),
            compose_model: config.genai_compose_model.clone(),
            text_model: config.genai_text_model.clone(),
            standard_capacity: config.standard_model_capacity,
            pro_capacity: config.pro_model_capacity,
        }
    }

    /// The image model matching the caller's stored preference.
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.standard_model,
            ModelTier::Pro => &self.pro_model,
        }
    }

    /// Reference-image capacity of the caller's preferred model.
    pub fn capacity_for(&self, tier: ModelTier) -> usize {
        match tier {
            ModelTier::Standard => self.standard_capacity,
            ModelTier::Pro => self.pro_capacity,
        }
    }
}
