use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle status of an AI job. Transitions are monotonic:
/// `queued -> running -> {succeeded|failed}`, never backwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Every job type the dispatcher knows how to execute. The database stores
/// the snake_case string; an unknown string fails the dispatch with
/// `UnknownJobType` rather than silently no-opping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobType {
    AutoTag,
    ProductShot,
    HeadshotGenerate,
    BodyShotGenerate,
    OutfitSuggest,
    ReferenceMatch,
    OutfitMannequin,
    OutfitRender,
    WardrobeItemGenerate,
    WardrobeItemRender,
    WardrobeItemTag,
}

/// A durable AI job row. `result` may be written twice: a partial payload
/// while still `running` (progressive client rendering), then the full
/// payload at terminal success. Readers must treat any non-terminal read
/// as provisional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub job_type: String,
    pub input: serde_json::Value,
    pub status: JobStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn job_type_round_trips_snake_case() {
        assert_eq!(JobType::WardrobeItemGenerate.to_string(), "wardrobe_item_generate");
        assert_eq!(JobType::from_str("outfit_render").unwrap(), JobType::OutfitRender);
        assert!(JobType::from_str("grow_mustache").is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
