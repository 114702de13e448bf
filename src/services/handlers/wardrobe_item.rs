use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{job_queries, wardrobe_queries};
use crate::models::attributes::ItemAttributes;
use crate::models::image::{ImagePurpose, ImageRef, ModelTier};
use crate::models::job::Job;
use crate::services::dispatcher::JobError;
use crate::services::handlers::{image_part, parse_input, shots, tag};
use crate::services::pipeline::{self, DownloadedImage};

#[derive(Debug, Deserialize)]
struct ItemJobInput {
    item_id: Uuid,
    image_id: Uuid,
}

/// Unified generate: one downloaded source feeds two independent branches.
/// The image branch publishes a partial result as soon as its upload lands,
/// so a polling client can render the shot before tagging finishes; the job
/// is all-or-nothing regardless.
pub async fn generate(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let (input, source, tier) = prepare(state, job).await?;

    let image_branch = image_branch(state, job, input.item_id, &source, tier, true);
    let text_branch = text_branch(state, input.item_id, job.owner_user_id, &source);

    // Both branches start immediately; the first error fails the join and
    // with it the whole job. A partial result already written stays
    // provisional and is never upgraded to success.
    let (image_ref, attributes) = tokio::try_join!(image_branch, text_branch)?;

    Ok(serde_json::json!({ "image": image_ref, "attributes": attributes }))
}

/// Image branch alone: regenerate the item's product shot.
pub async fn render(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let (input, source, tier) = prepare(state, job).await?;
    let image_ref = image_branch(state, job, input.item_id, &source, tier, false).await?;

    Ok(serde_json::json!({ "image": image_ref }))
}

/// Text branch alone: re-extract the item's attributes.
pub async fn tag(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let (input, source, _) = prepare(state, job).await?;
    let attributes = text_branch(state, input.item_id, job.owner_user_id, &source).await?;

    Ok(serde_json::json!({ "attributes": attributes }))
}

async fn prepare(
    state: &AppState,
    job: &Job,
) -> Result<(ItemJobInput, DownloadedImage, ModelTier), JobError> {
    let input: ItemJobInput = parse_input(job)?;
    let owner = job.owner_user_id;

    wardrobe_queries::get_item(&state.db, input.item_id, owner)
        .await?
        .ok_or_else(|| JobError::InvalidInput("wardrobe item not found".to_string()))?;

    let source = pipeline::download_image(
        &state.db,
        &state.storage,
        &state.http,
        input.image_id,
        owner,
    )
    .await?;

    let profile = wardrobe_queries::get_profile(&state.db, owner).await?;
    let tier = profile.model_tier.unwrap_or(ModelTier::Standard);

    Ok((input, source, tier))
}

async fn image_branch(
    state: &AppState,
    job: &Job,
    item_id: Uuid,
    source: &DownloadedImage,
    tier: ModelTier,
    publish_partial: bool,
) -> Result<ImageRef, JobError> {
    let generated = state
        .genai
        .generate_image(
            state.models.model_for(tier),
            shots::PRODUCT_SHOT_PROMPT,
            &[image_part(source)],
        )
        .await?;

    let (bytes, mime_type) = tokio::task::spawn_blocking(move || {
        pipeline::optimize(generated.bytes, &generated.mime_type)
    })
    .await
    .map_err(|e| JobError::Task(e.to_string()))?;

    let image_ref = pipeline::upload_generated(
        &state.db,
        &state.storage,
        job.owner_user_id,
        ImagePurpose::ProductShot,
        &bytes,
        &mime_type,
    )
    .await?;

    wardrobe_queries::set_item_image(&state.db, item_id, job.owner_user_id, image_ref.image_id)
        .await?;

    if publish_partial {
        let partial = serde_json::json!({ "image": image_ref });
        let wrote = job_queries::write_partial_result(&state.db, job.id, &partial).await?;
        if wrote {
            tracing::debug!(job_id = %job.id, image_id = %image_ref.image_id, "Published partial image result");
        }
    }

    Ok(image_ref)
}

async fn text_branch(
    state: &AppState,
    item_id: Uuid,
    owner: Uuid,
    source: &DownloadedImage,
) -> Result<ItemAttributes, JobError> {
    let attributes = tag::extract_attributes(state, source).await?;

    let value = serde_json::to_value(&attributes).map_err(|e| JobError::Task(e.to_string()))?;
    wardrobe_queries::upsert_item_attributes(&state.db, item_id, owner, &value).await?;

    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn branch_error_fails_the_join_even_after_partial() {
        let partial_written = AtomicBool::new(false);

        let image = async {
            partial_written.store(true, Ordering::SeqCst);
            Ok::<u32, JobError>(1)
        };
        let text = async { Err::<u32, JobError>(JobError::Parse("bad json".to_string())) };

        let joined = tokio::try_join!(image, text);
        assert!(joined.is_err());
        // The partial side effect happened; the overall outcome is still
        // a failure.
        assert!(partial_written.load(Ordering::SeqCst));
    }
}
