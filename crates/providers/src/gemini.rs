//! Gemini image generation adapter.
//!
//! Sends the assembled parts as a single user turn to
//! `models/{model}:generateContent` and returns the first inline image in the
//! response. No retries happen here.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use thumbforge_core::provider::{
    AssembledRequest, GeneratedImage, GenerationError, ImageGenerator, RequestPart,
};
use thumbforge_core::types::ImagePayload;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";

/// Longest slice of an upstream body kept in error messages.
const MAX_ERROR_BODY: usize = 500;

/// Errors from the Gemini API layer.
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Gemini returned a non-2xx status code.
    #[error("Gemini API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse Gemini response: {0}")]
    Parse(String),

    #[error("Failed to decode image data: {0}")]
    Decode(String),

    /// The prompt was refused by the safety filter.
    #[error("Prompt blocked: {0}")]
    Blocked(String),

    /// A well-formed response that carried no image part.
    #[error("Response contained no image")]
    NoImage,
}

impl From<GeminiError> for GenerationError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::Request(e) if e.is_timeout() => GenerationError::Timeout,
            GeminiError::NoImage => GenerationError::NoOutputProduced,
            other => GenerationError::Provider(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    pub prompt_feedback: Option<GeminiPromptFeedback>,
    pub model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    pub content: Option<GeminiContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    pub text: Option<String>,
    pub inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPromptFeedback {
    pub block_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Pure request/response mapping
// ---------------------------------------------------------------------------

/// Build the `generateContent` JSON body. Part order is preserved.
pub fn build_request_body(request: &AssembledRequest) -> serde_json::Value {
    let engine = base64::engine::general_purpose::STANDARD;
    let parts: Vec<serde_json::Value> = request
        .parts
        .iter()
        .map(|part| match part {
            RequestPart::Text(text) => serde_json::json!({ "text": text }),
            RequestPart::InlineImage(image) => serde_json::json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": engine.encode(&image.data),
                }
            }),
        })
        .collect();

    serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE", "TEXT"],
            "imageConfig": {
                "aspectRatio": request.aspect_ratio,
            }
        }
    })
}

/// Pull the first inline image (and any text) out of a parsed response.
pub fn extract_image(
    response: GeminiResponse,
    requested_model: &str,
) -> Result<GeneratedImage, GeminiError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GeminiError::Blocked(reason));
    }

    let mut image = None;
    let mut texts = Vec::new();
    for part in response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
    {
        if let Some(text) = part.text.filter(|t| !t.trim().is_empty()) {
            texts.push(text);
        }
        if image.is_none() {
            if let Some(inline) = part.inline_data {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(inline.data.as_bytes())
                    .map_err(|e| GeminiError::Decode(e.to_string()))?;
                image = Some(ImagePayload::new(inline.mime_type, data));
            }
        }
    }

    let image = image.ok_or(GeminiError::NoImage)?;
    Ok(GeneratedImage {
        image,
        model: response
            .model_version
            .unwrap_or_else(|| requested_model.to_string()),
        provider_text: (!texts.is_empty()).then(|| texts.join("\n")),
    })
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Live Gemini image generator.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_key, model)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            api_base: GEMINI_API_BASE.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Call the API and return the generated image.
    pub async fn generate_image(
        &self,
        request: &AssembledRequest,
    ) -> Result<GeneratedImage, GeminiError> {
        let url = format!("{}/{}:generateContent", self.api_base, self.model);
        let body = build_request_body(request);

        tracing::debug!(
            model = %self.model,
            parts = request.parts.len(),
            images = request.image_count(),
            "Sending Gemini generation request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GeminiError::Api {
                status: status.as_u16(),
                body: truncate(&text),
            });
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&text).map_err(|e| GeminiError::Parse(e.to_string()))?;
        extract_image(parsed, &self.model)
    }
}

#[async_trait]
impl ImageGenerator for GeminiGenerator {
    async fn generate(&self, request: &AssembledRequest) -> Result<GeneratedImage, GenerationError> {
        self.generate_image(request).await.map_err(|e| {
            tracing::error!(model = %self.model, error = %e, "Gemini generation failed");
            GenerationError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn request() -> AssembledRequest {
        AssembledRequest {
            parts: vec![
                RequestPart::Text("make a thumbnail".into()),
                RequestPart::InlineImage(ImagePayload::new("image/jpeg", vec![0xff, 0xd8])),
                RequestPart::Text("reference 1".into()),
            ],
            aspect_ratio: "16:9",
            width: 1280,
            height: 720,
        }
    }

    fn parse(json: serde_json::Value) -> GeminiResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn request_body_keeps_part_order() {
        let body = build_request_body(&request());
        let parts = body["contents"][0]["parts"].as_array().unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], "make a thumbnail");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "/9g=");
        assert_eq!(parts[2]["text"], "reference 1");
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
    }

    #[test]
    fn first_inline_image_is_returned() {
        let response = parse(serde_json::json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here you go"},
                    {"inlineData": {"mimeType": "image/png", "data": "AQID"}},
                    {"inlineData": {"mimeType": "image/png", "data": "BAUG"}}
                ]},
                "finishReason": "STOP"
            }],
            "modelVersion": "gemini-2.5-flash-image"
        }));

        let generated = extract_image(response, DEFAULT_MODEL).unwrap();
        assert_eq!(generated.image.data, vec![1, 2, 3]);
        assert_eq!(generated.image.mime_type, "image/png");
        assert_eq!(generated.model, "gemini-2.5-flash-image");
        assert_eq!(generated.provider_text.as_deref(), Some("Here you go"));
    }

    #[test]
    fn text_only_response_is_no_output() {
        let response = parse(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "I cannot draw that"}]}}]
        }));
        let err = extract_image(response, DEFAULT_MODEL).unwrap_err();
        assert_matches!(err, GeminiError::NoImage);
        assert_eq!(GenerationError::from(err), GenerationError::NoOutputProduced);
    }

    #[test]
    fn blocked_prompt_is_a_provider_error() {
        let response = parse(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }));
        let err = extract_image(response, DEFAULT_MODEL).unwrap_err();
        assert_matches!(err, GeminiError::Blocked(ref reason) if reason == "SAFETY");
        assert_matches!(GenerationError::from(err), GenerationError::Provider(_));
    }

    #[test]
    fn invalid_base64_is_a_decode_error() {
        let response = parse(serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "not base64!"}}
            ]}}]
        }));
        assert_matches!(
            extract_image(response, DEFAULT_MODEL),
            Err(GeminiError::Decode(_))
        );
    }

    #[test]
    fn missing_model_version_echoes_requested_model() {
        let response = parse(serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "AQID"}}
            ]}}]
        }));
        let generated = extract_image(response, "custom-model").unwrap();
        assert_eq!(generated.model, "custom-model");
        assert_eq!(generated.provider_text, None);
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY + 10);
        assert_eq!(truncate(&body).len(), MAX_ERROR_BODY + 3);
        assert_eq!(truncate("short"), "short");
    }
}
