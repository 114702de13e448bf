use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::config::ModelConfig;
use crate::db::wardrobe_queries;
use crate::models::image::{ImagePurpose, ImageRef, ModelTier};
use crate::models::job::Job;
use crate::services::compose;
use crate::services::dispatcher::JobError;
use crate::services::genai::ImagePart;
use crate::services::handlers::{image_part, parse_input};
use crate::services::pipeline::{self, DownloadedImage};

const MANNEQUIN_PROMPT: &str = concat!(
    "Combine all of the clothing items shown into one photorealistic ",
    "ghost-mannequin image: the items worn together as a complete outfit on ",
    "an invisible mannequin, front-facing, plain light background, 3:4 ",
    "portrait framing. Preserve each item's exact colors and details."
);

const COMPOSE_PROMPT: &str = concat!(
    "Dress the person from the reference photo(s) in the outfit shown on ",
    "the ghost mannequin. Keep the person's face, body, skin tone and ",
    "proportions exactly as in the references; keep every garment's colors ",
    "and details exactly as on the mannequin. Natural lighting, full-body, ",
    "plain background."
);

const DIRECT_RENDER_PROMPT: &str = concat!(
    "Dress the person from the reference photo(s) in all of the clothing ",
    "items shown. Keep the person's face, body, skin tone and proportions ",
    "exactly as in the references; keep every item's colors and details. ",
    "Natural lighting, full-body, plain background."
);

/// How an outfit render reaches its final composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    /// One call: references plus every item image.
    Direct,
    /// Mannequin first (preferred model), then blend (fixed compose model).
    /// The underlying model caps reference images per call.
    Staged,
    /// A previously generated mannequin was supplied; skip straight to the
    /// blend pass.
    FromMannequin(Uuid),
}

/// The staged-vs-direct rule: `count > limit -> staged; else -> direct`,
/// with a supplied mannequin short-circuiting both.
pub fn choose_render_path(
    item_count: usize,
    tier: ModelTier,
    models: &ModelConfig,
    stacked_image_id: Option<Uuid>,
) -> RenderPath {
    if let Some(id) = stacked_image_id {
        return RenderPath::FromMannequin(id);
    }
    if item_count > models.capacity_for(tier) {
        RenderPath::Staged
    } else {
        RenderPath::Direct
    }
}

#[derive(Debug, Deserialize)]
struct MannequinInput {
    #[serde(default)]
    outfit_id: Option<Uuid>,
    #[serde(default)]
    selected: Vec<Uuid>,
}

/// Generate a ghost-mannequin composite of an outfit's items.
pub async fn outfit_mannequin(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let input: MannequinInput = parse_input(job)?;
    let owner = job.owner_user_id;

    let item_ids = if !input.selected.is_empty() {
        input.selected.clone()
    } else if let Some(outfit_id) = input.outfit_id {
        wardrobe_queries::get_outfit(&state.db, outfit_id, owner)
            .await?
            .ok_or_else(|| JobError::InvalidInput("outfit not found".to_string()))?
            .item_ids
    } else {
        return Err(JobError::InvalidInput(
            "outfit_id or a non-empty selected item list is required".to_string(),
        ));
    };

    let image_ids = wardrobe_queries::item_image_ids(&state.db, owner, &item_ids).await?;
    if image_ids.is_empty() {
        return Err(JobError::InvalidInput(
            "selected items have no photos".to_string(),
        ));
    }

    let profile = wardrobe_queries::get_profile(&state.db, owner).await?;
    let tier = profile.model_tier.unwrap_or(ModelTier::Standard);

    let (bytes, mime_type) = generate_mannequin(state, owner, tier, &image_ids).await?;

    let image_ref = pipeline::upload_generated(
        &state.db,
        &state.storage,
        owner,
        ImagePurpose::Mannequin,
        &bytes,
        &mime_type,
    )
    .await?;

    if let Some(outfit_id) = input.outfit_id {
        wardrobe_queries::set_outfit_mannequin_image(&state.db, outfit_id, owner, image_ref.image_id)
            .await?;
    }

    Ok(serde_json::json!({ "mannequin_image": image_ref }))
}

#[derive(Debug, Deserialize)]
struct RenderInput {
    outfit_id: Uuid,
    #[serde(default)]
    stacked_image_id: Option<Uuid>,
    #[serde(default)]
    selected: Vec<Uuid>,
}

/// Render an outfit onto the caller's body/head references.
pub async fn outfit_render(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let input: RenderInput = parse_input(job)?;
    let owner = job.owner_user_id;

    // The outfit must exist for this owner before any expensive work.
    wardrobe_queries::get_outfit(&state.db, input.outfit_id, owner)
        .await?
        .ok_or_else(|| JobError::InvalidInput("outfit not found".to_string()))?;

    let item_image_ids = if input.stacked_image_id.is_none() {
        if input.selected.is_empty() {
            return Err(JobError::InvalidInput(
                "either stacked_image_id or a non-empty selected item list is required".to_string(),
            ));
        }
        let ids = wardrobe_queries::item_image_ids(&state.db, owner, &input.selected).await?;
        if ids.is_empty() {
            return Err(JobError::InvalidInput(
                "selected items have no photos".to_string(),
            ));
        }
        ids
    } else {
        Vec::new()
    };

    let profile = wardrobe_queries::get_profile(&state.db, owner).await?;
    let tier = profile.model_tier.unwrap_or(ModelTier::Standard);

    // Head and body references are independent; fetch them concurrently.
    let (head, body) = tokio::try_join!(
        maybe_download(state, owner, profile.head_image_id),
        maybe_download(state, owner, profile.body_image_id),
    )?;
    if head.is_none() && body.is_none() {
        return Err(JobError::InvalidInput(
            "profile has no head or body reference image".to_string(),
        ));
    }

    let mut reference_parts: Vec<ImagePart> = Vec::new();
    if let Some(ref image) = head {
        reference_parts.push(image_part(image));
    }
    if let Some(ref image) = body {
        reference_parts.push(image_part(image));
    }

    let path = choose_render_path(item_image_ids.len(), tier, &state.models, input.stacked_image_id);

    let (image_ref, mannequin_image_id) = match path {
        RenderPath::Direct => {
            let items = download_all(state, owner, &item_image_ids).await?;
            let mut parts = reference_parts;
            parts.extend(items.iter().map(image_part));

            let image_ref = finish_render(
                state,
                owner,
                state.models.model_for(tier),
                DIRECT_RENDER_PROMPT,
                parts,
            )
            .await?;
            (image_ref, None)
        }
        RenderPath::Staged => {
            let (bytes, mime_type) = generate_mannequin(state, owner, tier, &item_image_ids).await?;

            // Persist the intermediate so later renders can reuse it.
            let mannequin_ref = pipeline::upload_generated(
                &state.db,
                &state.storage,
                owner,
                ImagePurpose::Mannequin,
                &bytes,
                &mime_type,
            )
            .await?;
            wardrobe_queries::set_outfit_mannequin_image(
                &state.db,
                input.outfit_id,
                owner,
                mannequin_ref.image_id,
            )
            .await?;

            let mut parts = reference_parts;
            parts.push(ImagePart {
                mime_type,
                bytes,
            });

            // The blend pass always runs on the fixed compose model, not
            // the caller's preference.
            let image_ref = finish_render(
                state,
                owner,
                &state.models.compose_model,
                COMPOSE_PROMPT,
                parts,
            )
            .await?;
            (image_ref, Some(mannequin_ref.image_id))
        }
        RenderPath::FromMannequin(mannequin_id) => {
            let mannequin = pipeline::download_image(
                &state.db,
                &state.storage,
                &state.http,
                mannequin_id,
                owner,
            )
            .await?;

            let mut parts = reference_parts;
            parts.push(image_part(&mannequin));

            let image_ref = finish_render(
                state,
                owner,
                &state.models.compose_model,
                COMPOSE_PROMPT,
                parts,
            )
            .await?;
            (image_ref, Some(mannequin_id))
        }
    };

    wardrobe_queries::set_outfit_rendered_image(&state.db, input.outfit_id, owner, image_ref.image_id)
        .await?;

    let mut result = serde_json::json!({ "image": image_ref });
    if let Some(id) = mannequin_image_id {
        result["mannequin_image_id"] = serde_json::json!(id);
    }
    Ok(result)
}

/// Download item images, grid-composite them when they exceed the preferred
/// model's capacity, and generate the mannequin on the preferred model.
async fn generate_mannequin(
    state: &AppState,
    owner: Uuid,
    tier: ModelTier,
    item_image_ids: &[Uuid],
) -> Result<(Vec<u8>, String), JobError> {
    let images = download_all(state, owner, item_image_ids).await?;
    let parts = mannequin_parts(images, state.models.capacity_for(tier)).await?;

    let generated = state
        .genai
        .generate_image(state.models.model_for(tier), MANNEQUIN_PROMPT, &parts)
        .await?;

    let optimized = tokio::task::spawn_blocking(move || {
        pipeline::optimize(generated.bytes, &generated.mime_type)
    })
    .await
    .map_err(|e| JobError::Task(e.to_string()))?;

    Ok(optimized)
}

/// Either pass item images through individually or flatten them into a
/// single grid when the model cannot accept that many references.
async fn mannequin_parts(
    images: Vec<DownloadedImage>,
    capacity: usize,
) -> Result<Vec<ImagePart>, JobError> {
    if images.len() <= capacity {
        return Ok(images.iter().map(image_part).collect());
    }

    let jpeg = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, JobError> {
        let mut decoded = Vec::with_capacity(images.len());
        for image in &images {
            decoded.push(
                image::load_from_memory(&image.bytes)
                    .map_err(|e| JobError::Compose(e.into()))?,
            );
        }
        compose::compose_grid(&decoded).map_err(JobError::Compose)
    })
    .await
    .map_err(|e| JobError::Task(e.to_string()))??;

    Ok(vec![ImagePart {
        mime_type: "image/jpeg".to_string(),
        bytes: jpeg,
    }])
}

async fn finish_render(
    state: &AppState,
    owner: Uuid,
    model: &str,
    prompt: &str,
    parts: Vec<ImagePart>,
) -> Result<ImageRef, JobError> {
    let generated = state.genai.generate_image(model, prompt, &parts).await?;

    let (bytes, mime_type) = tokio::task::spawn_blocking(move || {
        pipeline::optimize(generated.bytes, &generated.mime_type)
    })
    .await
    .map_err(|e| JobError::Task(e.to_string()))?;

    let image_ref = pipeline::upload_generated(
        &state.db,
        &state.storage,
        owner,
        ImagePurpose::OutfitRender,
        &bytes,
        &mime_type,
    )
    .await?;

    Ok(image_ref)
}

async fn maybe_download(
    state: &AppState,
    owner: Uuid,
    image_id: Option<Uuid>,
) -> Result<Option<DownloadedImage>, JobError> {
    match image_id {
        Some(id) => Ok(Some(
            pipeline::download_image(&state.db, &state.storage, &state.http, id, owner).await?,
        )),
        None => Ok(None),
    }
}

/// Start every download concurrently, then collect in order. The first
/// error wins.
async fn download_all(
    state: &AppState,
    owner: Uuid,
    image_ids: &[Uuid],
) -> Result<Vec<DownloadedImage>, JobError> {
    let mut handles = Vec::with_capacity(image_ids.len());
    for &id in image_ids {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            pipeline::download_image(&state.db, &state.storage, &state.http, id, owner).await
        }));
    }

    let mut images = Vec::with_capacity(handles.len());
    for handle in handles {
        images.push(handle.await.map_err(|e| JobError::Task(e.to_string()))??);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> ModelConfig {
        ModelConfig {
            standard_model: "standard-image".to_string(),
            pro_model: "pro-image".to_string(),
            compose_model: "compose-image".to_string(),
            text_model: "text".to_string(),
            standard_capacity: 2,
            pro_capacity: 7,
        }
    }

    #[test]
    fn standard_tier_over_capacity_goes_staged() {
        let path = choose_render_path(3, ModelTier::Standard, &models(), None);
        assert_eq!(path, RenderPath::Staged);
    }

    #[test]
    fn standard_tier_at_capacity_goes_direct() {
        let path = choose_render_path(2, ModelTier::Standard, &models(), None);
        assert_eq!(path, RenderPath::Direct);
    }

    #[test]
    fn pro_tier_within_capacity_goes_direct() {
        let path = choose_render_path(5, ModelTier::Pro, &models(), None);
        assert_eq!(path, RenderPath::Direct);
    }

    #[test]
    fn pro_tier_over_capacity_goes_staged() {
        let path = choose_render_path(8, ModelTier::Pro, &models(), None);
        assert_eq!(path, RenderPath::Staged);
    }

    #[test]
    fn supplied_mannequin_short_circuits() {
        let id = Uuid::new_v4();
        let path = choose_render_path(12, ModelTier::Standard, &models(), Some(id));
        assert_eq!(path, RenderPath::FromMannequin(id));
    }
}
