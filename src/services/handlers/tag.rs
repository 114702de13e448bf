use garde::Validate;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::attributes::ItemAttributes;
use crate::models::job::Job;
use crate::services::dispatcher::JobError;
use crate::services::handlers::{image_part, parse_input, strip_code_fences};
use crate::services::pipeline::{self, DownloadedImage};

const TAG_PROMPT: &str = concat!(
    "Analyze this clothing item photo and extract the following fields as JSON: ",
    "category (e.g. Jacket, Dress, Sneakers), color (dominant color), ",
    "pattern, material, season, style_tags (array of short style keywords). ",
    "Return ONLY valid JSON with these exact field names."
);

#[derive(Debug, Deserialize)]
struct AutoTagInput {
    image_id: Uuid,
}

/// Tag a raw image without an owning wardrobe item; the attributes travel
/// back in the job result only.
pub async fn auto_tag(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let input: AutoTagInput = parse_input(job)?;

    let image = pipeline::download_image(
        &state.db,
        &state.storage,
        &state.http,
        input.image_id,
        job.owner_user_id,
    )
    .await?;

    let attributes = extract_attributes(state, &image).await?;

    Ok(serde_json::json!({ "attributes": attributes }))
}

/// Text-model attribute extraction shared with the wardrobe-item handlers.
pub(crate) async fn extract_attributes(
    state: &AppState,
    image: &DownloadedImage,
) -> Result<ItemAttributes, JobError> {
    let text = state
        .genai
        .generate_text(&state.models.text_model, TAG_PROMPT, &[image_part(image)])
        .await?;

    parse_attributes(&text)
}

fn parse_attributes(text: &str) -> Result<ItemAttributes, JobError> {
    let attributes: ItemAttributes = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| JobError::Parse(e.to_string()))?;

    attributes
        .validate()
        .map_err(|e| JobError::Parse(e.to_string()))?;

    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_model_output() {
        let text = "```json\n{\"category\":\"Dress\",\"color\":\"Navy\",\"style_tags\":[\"formal\"]}\n```";
        let attrs = parse_attributes(text).unwrap();
        assert_eq!(attrs.category, "Dress");
        assert_eq!(attrs.style_tags, vec!["formal"]);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            parse_attributes("the item is a nice jacket"),
            Err(JobError::Parse(_))
        ));
    }

    #[test]
    fn degenerate_attributes_rejected() {
        let text = r#"{"category":"","color":"Red"}"#;
        assert!(matches!(parse_attributes(text), Err(JobError::Parse(_))));
    }
}
