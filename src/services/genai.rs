use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Client for the Gemini `generateContent` REST API. Stateless: one HTTP
/// call per generation, no session reuse across jobs.
pub struct GenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

/// A source image attached to a generation request.
#[derive(Debug, Clone)]
pub struct ImagePart {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// An image returned by the model.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

impl GenAiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Invoke the model and return the first inline image of the first
    /// candidate.
    pub async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
        images: &[ImagePart],
    ) -> Result<GeneratedImage, GenAiError> {
        let response = self.generate(model, prompt, images).await?;
        first_image_part(response)
    }

    /// Invoke the model and return the trimmed first text part of the first
    /// candidate.
    pub async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        images: &[ImagePart],
    ) -> Result<String, GenAiError> {
        let response = self.generate(model, prompt, images).await?;
        first_text_part(response)
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        images: &[ImagePart],
    ) -> Result<GenerateResponse, GenAiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        // The prompt leads; image parts follow in caller order.
        let mut parts = vec![Part {
            text: Some(prompt.to_string()),
            inline_data: None,
        }];
        for image in images {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: image.mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
                }),
            });
        }

        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(GenAiError::Http)?;

        if !response.status().is_success() {
            // Upstream error bodies carry the diagnostic operators need;
            // pass them through verbatim.
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenAiError::Upstream(format!("{status}: {body}")));
        }

        response.json().await.map_err(GenAiError::Http)
    }
}

fn first_candidate(response: GenerateResponse) -> Result<Candidate, GenAiError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(GenAiError::NoOutput)?;

    let finish_reason = candidate.finish_reason.as_deref().unwrap_or("STOP");
    if !finish_reason.eq_ignore_ascii_case("stop") {
        return Err(GenAiError::Blocked(finish_reason.to_string()));
    }

    Ok(candidate)
}

fn first_image_part(response: GenerateResponse) -> Result<GeneratedImage, GenAiError> {
    let candidate = first_candidate(response)?;
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let inline = parts
        .into_iter()
        .find_map(|p| p.inline_data)
        .ok_or(GenAiError::NoOutput)?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| GenAiError::Decode(e.to_string()))?;

    Ok(GeneratedImage {
        mime_type: inline.mime_type,
        bytes,
    })
}

fn first_text_part(response: GenerateResponse) -> Result<String, GenAiError> {
    let candidate = first_candidate(response)?;
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    parts
        .into_iter()
        .find_map(|p| p.text)
        .map(|t| t.trim().to_string())
        .ok_or(GenAiError::NoOutput)
}

#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation API error: {0}")]
    Upstream(String),

    #[error("generation blocked (finish reason {0})")]
    Blocked(String),

    #[error("generation returned no usable output")]
    NoOutput,

    #[error("generation response malformed: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_from(json: &str) -> GenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn extracts_first_inline_image() {
        let resp = response_from(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"here you go"},
                {"inlineData":{"mimeType":"image/png","data":"aGVsbG8="}},
                {"inlineData":{"mimeType":"image/jpeg","data":"d29ybGQ="}}
            ]},"finishReason":"STOP"}]}"#,
        );
        let image = first_image_part(resp).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn extracts_trimmed_text() {
        let resp = response_from(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"  {\"category\":\"Jacket\"}\n"}
            ]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(first_text_part(resp).unwrap(), r#"{"category":"Jacket"}"#);
    }

    #[test]
    fn non_stop_finish_reason_is_blocked() {
        let resp = response_from(
            r#"{"candidates":[{"content":{"parts":[{"text":"no"}]},"finishReason":"SAFETY"}]}"#,
        );
        assert!(matches!(
            first_text_part(resp),
            Err(GenAiError::Blocked(reason)) if reason == "SAFETY"
        ));
    }

    #[test]
    fn empty_candidates_is_no_output() {
        let resp = response_from(r#"{"candidates":[]}"#);
        assert!(matches!(first_image_part(resp), Err(GenAiError::NoOutput)));
    }

    #[test]
    fn text_only_response_has_no_image() {
        let resp = response_from(
            r#"{"candidates":[{"content":{"parts":[{"text":"sorry"}]},"finishReason":"STOP"}]}"#,
        );
        assert!(matches!(first_image_part(resp), Err(GenAiError::NoOutput)));
    }
}
