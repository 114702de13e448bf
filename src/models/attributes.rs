use garde::Validate;
use serde::{Deserialize, Serialize};

/// Structured attributes extracted from an item photo by the text model.
/// The model is prompted to return exactly these fields as JSON; garde
/// bounds reject degenerate output before it reaches the database.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ItemAttributes {
    #[garde(length(min = 1, max = 100))]
    pub category: String,

    #[garde(length(min = 1, max = 100))]
    pub color: String,

    #[garde(skip)]
    pub pattern: Option<String>,

    #[garde(skip)]
    pub material: Option<String>,

    #[garde(skip)]
    pub season: Option<String>,

    #[garde(inner(length(min = 1, max = 50)))]
    #[serde(default)]
    pub style_tags: Vec<String>,
}

/// One outfit proposal from the suggestion model.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OutfitSuggestion {
    #[garde(length(min = 1, max = 200))]
    pub title: String,

    #[garde(skip)]
    pub item_names: Vec<String>,

    #[garde(skip)]
    pub reasoning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_parse_from_model_json() {
        let json = r#"{
            "category": "Jacket",
            "color": "Olive",
            "pattern": null,
            "material": "Cotton twill",
            "season": "Fall",
            "style_tags": ["utility", "casual"]
        }"#;
        let attrs: ItemAttributes = serde_json::from_str(json).unwrap();
        assert!(attrs.validate().is_ok());
        assert_eq!(attrs.style_tags.len(), 2);
    }

    #[test]
    fn empty_category_rejected() {
        let json = r#"{"category": "", "color": "Red"}"#;
        let attrs: ItemAttributes = serde_json::from_str(json).unwrap();
        assert!(attrs.validate().is_err());
    }
}
