//! One handler per job type. Each validates its own input payload, composes
//! the image pipeline and the model adapter, and returns the job's result
//! payload.

pub mod reference;
pub mod render;
pub mod shots;
pub mod suggest;
pub mod tag;
pub mod wardrobe_item;

use serde::de::DeserializeOwned;

use crate::models::job::Job;
use crate::services::dispatcher::JobError;
use crate::services::genai::ImagePart;
use crate::services::pipeline::DownloadedImage;

/// Deserialize the job's input payload, failing fast with the field-level
/// serde message when required fields are absent.
pub(crate) fn parse_input<T: DeserializeOwned>(job: &Job) -> Result<T, JobError> {
    serde_json::from_value(job.input.clone()).map_err(|e| JobError::InvalidInput(e.to_string()))
}

pub(crate) fn image_part(image: &DownloadedImage) -> ImagePart {
    ImagePart {
        mime_type: image.mime_type().to_string(),
        bytes: image.bytes.clone(),
    }
}

/// Models often wrap JSON in markdown fences; strip them before parsing.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }
}
