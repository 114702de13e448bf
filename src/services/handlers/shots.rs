use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::wardrobe_queries;
use crate::models::image::{ImagePurpose, ImageRef, ModelTier};
use crate::models::job::Job;
use crate::services::dispatcher::JobError;
use crate::services::handlers::{image_part, parse_input};
use crate::services::pipeline;

pub(crate) const PRODUCT_SHOT_PROMPT: &str = concat!(
    "Recreate the clothing item in this photo as a clean e-commerce product ",
    "shot: front-facing, evenly lit, on a plain light-grey studio background, ",
    "no person, no mannequin. Preserve the item's exact colors, fabric ",
    "texture and details."
);

const HEADSHOT_PROMPT: &str = concat!(
    "Generate a natural, professional headshot of the person in this photo: ",
    "shoulders up, soft studio lighting, neutral background. Keep the ",
    "person's facial features, skin tone and hair exactly as they are."
);

const BODY_SHOT_PROMPT: &str = concat!(
    "Generate a full-body reference photo of the person in this photo: ",
    "standing, relaxed pose, neutral fitted clothing, plain background, even ",
    "lighting. Keep the person's build, proportions and skin tone exactly as ",
    "they are."
);

#[derive(Debug, Deserialize)]
struct ShotInput {
    image_id: Uuid,
}

pub async fn product_shot(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let input: ShotInput = parse_input(job)?;
    let image_ref = generate_shot(
        state,
        job.owner_user_id,
        input.image_id,
        PRODUCT_SHOT_PROMPT,
        ImagePurpose::ProductShot,
    )
    .await?;

    Ok(serde_json::json!({ "image": image_ref }))
}

pub async fn headshot_generate(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let input: ShotInput = parse_input(job)?;
    let image_ref = generate_shot(
        state,
        job.owner_user_id,
        input.image_id,
        HEADSHOT_PROMPT,
        ImagePurpose::Headshot,
    )
    .await?;

    wardrobe_queries::set_profile_head_image(&state.db, job.owner_user_id, image_ref.image_id)
        .await?;

    Ok(serde_json::json!({ "image": image_ref }))
}

pub async fn body_shot_generate(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let input: ShotInput = parse_input(job)?;
    let image_ref = generate_shot(
        state,
        job.owner_user_id,
        input.image_id,
        BODY_SHOT_PROMPT,
        ImagePurpose::BodyShot,
    )
    .await?;

    wardrobe_queries::set_profile_body_image(&state.db, job.owner_user_id, image_ref.image_id)
        .await?;

    Ok(serde_json::json!({ "image": image_ref }))
}

/// Shared single-source generation path: download, generate on the caller's
/// preferred model, optimize, upload.
async fn generate_shot(
    state: &AppState,
    owner_user_id: Uuid,
    source_image_id: Uuid,
    prompt: &str,
    purpose: ImagePurpose,
) -> Result<ImageRef, JobError> {
    let source = pipeline::download_image(
        &state.db,
        &state.storage,
        &state.http,
        source_image_id,
        owner_user_id,
    )
    .await?;

    let profile = wardrobe_queries::get_profile(&state.db, owner_user_id).await?;
    let tier = profile.model_tier.unwrap_or(ModelTier::Standard);

    let generated = state
        .genai
        .generate_image(state.models.model_for(tier), prompt, &[image_part(&source)])
        .await?;

    let (bytes, mime_type) = tokio::task::spawn_blocking(move || {
        pipeline::optimize(generated.bytes, &generated.mime_type)
    })
    .await
    .map_err(|e| JobError::Task(e.to_string()))?;

    let image_ref = pipeline::upload_generated(
        &state.db,
        &state.storage,
        owner_user_id,
        purpose,
        &bytes,
        &mime_type,
    )
    .await?;

    Ok(image_ref)
}
