use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// A stored image: bytes live in blob storage under `storage_key`,
/// metadata lives in the `images` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub storage_key: String,
    pub mime_type: String,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
}

/// Pointer handed back to job results: the id plus the mime type actually
/// written, so clients never need a second lookup to render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRef {
    pub image_id: Uuid,
    pub mime_type: String,
}

/// Purpose segment of the storage key (`<owner>/ai/<purpose>/<uuid>.jpg`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ImagePurpose {
    ProductShot,
    Headshot,
    BodyShot,
    Mannequin,
    OutfitRender,
}

/// The caller's stored generation-model preference. Capacity limits per
/// tier come from configuration, not from this enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelTier {
    Standard,
    Pro,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purpose_is_kebab_case() {
        assert_eq!(ImagePurpose::ProductShot.to_string(), "product-shot");
        assert_eq!(ImagePurpose::OutfitRender.to_string(), "outfit-render");
    }
}
