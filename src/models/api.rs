use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::JobStatus;

/// Body of `POST /ai-job-runner`. The client creates the job row first and
/// then fires this trigger with a short timeout; execution continues
/// server-side even if the client's socket gives up.
#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub job_id: Uuid,
}

/// Success envelope for the trigger endpoint.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub result: serde_json::Value,
}

/// Failure envelope for the trigger endpoint (handler errors).
#[derive(Debug, Serialize)]
pub struct TriggerErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Response for `GET /ai-jobs/{id}`, the polling read path over HTTP.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}
