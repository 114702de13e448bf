use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::wardrobe_queries::{self, ItemSummary};
use crate::models::job::Job;
use crate::services::dispatcher::JobError;
use crate::services::handlers::{image_part, parse_input, strip_code_fences};
use crate::services::pipeline;

const DESCRIBE_PROMPT: &str = concat!(
    "List every clothing item and accessory visible in this photo. Return ",
    "ONLY a JSON array of short garment descriptions, e.g. ",
    "[\"black leather biker jacket\", \"white low-top sneakers\"]."
);

/// Minimum similarity for a wardrobe item to count as a match.
const MATCH_FLOOR: f64 = 0.55;

#[derive(Debug, Deserialize)]
struct ReferenceMatchInput {
    image_id: Uuid,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedMatch {
    pub item_id: Uuid,
    pub item_name: String,
    pub description: String,
    pub score: f64,
}

/// Match an inspiration photo against the caller's wardrobe: the model
/// describes the garments, each description is fuzzy-matched against item
/// names.
pub async fn reference_match(state: &AppState, job: &Job) -> Result<serde_json::Value, JobError> {
    let input: ReferenceMatchInput = parse_input(job)?;

    let image = pipeline::download_image(
        &state.db,
        &state.storage,
        &state.http,
        input.image_id,
        job.owner_user_id,
    )
    .await?;

    let text = state
        .genai
        .generate_text(&state.models.text_model, DESCRIBE_PROMPT, &[image_part(&image)])
        .await?;

    let descriptions: Vec<String> = serde_json::from_str(strip_code_fences(&text))
        .map_err(|e| JobError::Parse(e.to_string()))?;

    let items = wardrobe_queries::list_items(&state.db, job.owner_user_id).await?;
    let matches = rank_matches(&descriptions, &items);

    Ok(serde_json::json!({ "matches": matches }))
}

/// Best wardrobe item per description, floor-filtered, best score first.
/// An item matched by several descriptions keeps only its best score.
fn rank_matches(descriptions: &[String], items: &[ItemSummary]) -> Vec<RankedMatch> {
    let mut best: std::collections::HashMap<Uuid, RankedMatch> = std::collections::HashMap::new();

    for description in descriptions {
        let mut top: Option<RankedMatch> = None;
        for item in items {
            let score = jaro_winkler(&description.to_lowercase(), &item.name.to_lowercase());
            if score < MATCH_FLOOR {
                continue;
            }
            if top.as_ref().map_or(true, |t| score > t.score) {
                top = Some(RankedMatch {
                    item_id: item.id,
                    item_name: item.name.clone(),
                    description: description.clone(),
                    score,
                });
            }
        }

        if let Some(candidate) = top {
            match best.get(&candidate.item_id) {
                Some(existing) if existing.score >= candidate.score => {}
                _ => {
                    best.insert(candidate.item_id, candidate);
                }
            }
        }
    }

    let mut ranked: Vec<RankedMatch> = best.into_values().collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> ItemSummary {
        ItemSummary {
            id: Uuid::new_v4(),
            name: name.to_string(),
            image_id: None,
            attributes: None,
        }
    }

    #[test]
    fn close_names_match_and_rank_by_score() {
        let items = vec![
            item("Black leather biker jacket"),
            item("White low-top sneakers"),
            item("Red silk scarf"),
        ];
        let descriptions = vec![
            "black leather biker jacket".to_string(),
            "white sneakers".to_string(),
        ];

        let ranked = rank_matches(&descriptions, &items);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].item_name, "Black leather biker jacket");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn unrelated_descriptions_fall_below_floor() {
        let items = vec![item("Red silk scarf")];
        let descriptions = vec!["over-ear studio headphones".to_string()];
        assert!(rank_matches(&descriptions, &items).is_empty());
    }

    #[test]
    fn item_keeps_best_score_across_descriptions() {
        let items = vec![item("Denim jacket")];
        let descriptions = vec![
            "denim jackets".to_string(),
            "denim jacket".to_string(),
        ];
        let ranked = rank_matches(&descriptions, &items);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].description, "denim jacket");
    }
}
