use garde::Validate;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::db::wardrobe_queries::{self, ItemSummary};
use crate::models::attributes::OutfitSuggestion;
use crate::models::job::Job;
use crate::services::dispatcher::JobError;
use crate::services::handlers::{parse_input, strip_code_fences};

#[derive(Debug, Deserialize)]
struct SuggestInput {
    #[serde(default)]
    occasion: Option<String>,
}

/// Text-only: ask the model for outfit combinations over the caller's
/// wardrobe inventory.
pub async fn outfit_suggest(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let input: SuggestInput = parse_input(job)?;

    let items = wardrobe_queries::list_items(&state.db, job.owner_user_id).await?;
    if items.is_empty() {
        return Err(JobError::InvalidInput(
            "wardrobe has no items to suggest from".to_string(),
        ));
    }

    let prompt = build_prompt(&items, input.occasion.as_deref());
    let text = state
        .genai
        .generate_text(&state.models.text_model, &prompt, &[])
        .await?;

    let suggestions = parse_suggestions(&text)?;

    Ok(serde_json::json!({ "suggestions": suggestions }))
}

fn build_prompt(items: &[ItemSummary], occasion: Option<&str>) -> String {
    let mut inventory = String::new();
    for item in items {
        inventory.push_str("- ");
        inventory.push_str(&item.name);
        if let Some(attrs) = &item.attributes {
            inventory.push_str(&format!(" {attrs}"));
        }
        inventory.push('\n');
    }

    let occasion_line = occasion
        .map(|o| format!("The occasion is: {o}.\n"))
        .unwrap_or_default();

    format!(
        "You are a personal stylist. Given this wardrobe:\n{inventory}\n\
         {occasion_line}\
         Propose up to 3 complete outfits using only these items. Return ONLY \
         a JSON array where each element has: title, item_names (array of \
         item names exactly as listed), reasoning."
    )
}

fn parse_suggestions(text: &str) -> Result<Vec<OutfitSuggestion>, JobError> {
    let suggestions: Vec<OutfitSuggestion> = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| JobError::Parse(e.to_string()))?;

    for suggestion in &suggestions {
        suggestion
            .validate()
            .map_err(|e| JobError::Parse(e.to_string()))?;
    }

    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(name: &str) -> ItemSummary {
        ItemSummary {
            id: Uuid::new_v4(),
            name: name.to_string(),
            image_id: None,
            attributes: None,
        }
    }

    #[test]
    fn prompt_lists_every_item() {
        let items = vec![item("Olive field jacket"), item("White sneakers")];
        let prompt = build_prompt(&items, Some("casual friday"));
        assert!(prompt.contains("- Olive field jacket"));
        assert!(prompt.contains("- White sneakers"));
        assert!(prompt.contains("casual friday"));
    }

    #[test]
    fn parses_suggestion_array() {
        let text = r#"[{"title":"Smart casual","item_names":["Olive field jacket"],"reasoning":"layers well"}]"#;
        let suggestions = parse_suggestions(text).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "Smart casual");
    }

    #[test]
    fn non_array_output_is_a_parse_error() {
        assert!(matches!(
            parse_suggestions(r#"{"title":"not an array"}"#),
            Err(JobError::Parse(_))
        ));
    }
}
