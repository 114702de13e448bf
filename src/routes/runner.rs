use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::job_queries;
use crate::models::api::{JobStatusResponse, TriggerErrorResponse, TriggerRequest, TriggerResponse};
use crate::services::dispatcher::{self, JobError};

/// POST /ai-job-runner — execute a queued job for the authenticated caller.
///
/// Clients fire this with a short timeout and rely on polling for the
/// outcome, so the dispatch runs on its own task: dropping the request
/// future must not cancel job execution.
pub async fn run_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<serde_json::Value>>,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // A missing or malformed body is the caller's mistake, not a handler
    // failure: 400, never a failed job row.
    let request = body.and_then(|Json(b)| serde_json::from_value::<TriggerRequest>(b).ok());
    let Some(TriggerRequest { job_id }) = request else {
        return error_response(StatusCode::BAD_REQUEST, "missing job_id".to_string());
    };

    let task_state = state.clone();
    let execution = tokio::spawn(async move {
        dispatcher::dispatch(&task_state, job_id, authorization.as_deref()).await
    });

    match execution.await {
        Ok(Ok(result)) => Json(TriggerResponse {
            success: true,
            result,
        })
        .into_response(),
        Ok(Err(e)) => error_response(status_for(&e), e.to_string()),
        Err(join_err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("job execution task failed: {join_err}"),
        ),
    }
}

/// GET /ai-jobs/{job_id} — the polling read path over HTTP, scoped to the
/// caller.
pub async fn get_job_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<Uuid>,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let caller = match state.auth.caller_from_header(authorization) {
        Ok(caller) => caller,
        Err(e) => return error_response(StatusCode::UNAUTHORIZED, e.to_string()),
    };

    match job_queries::get_job_for_owner(&state.db, job_id, caller).await {
        Ok(Some(job)) => Json(JobStatusResponse {
            job_id: job.id,
            status: job.status,
            result: job.result,
            error: job.error,
        })
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "job not found".to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn status_for(error: &JobError) -> StatusCode {
    match error {
        JobError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        JobError::NotFound => StatusCode::NOT_FOUND,
        JobError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(TriggerErrorResponse {
            success: false,
            error: message,
        }),
    )
        .into_response()
}
