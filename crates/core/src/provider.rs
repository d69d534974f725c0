//! Capability interfaces for the external AI and search providers.
//!
//! Concrete adapters live in the `thumbforge-providers` crate; tests inject
//! fakes. None of these traits retry on their own.

use async_trait::async_trait;

use crate::types::ImagePayload;

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// One part of a multi-part generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPart {
    Text(String),
    InlineImage(ImagePayload),
}

/// An ordered multi-part request plus the output dimensions it demands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledRequest {
    pub parts: Vec<RequestPart>,
    pub aspect_ratio: &'static str,
    pub width: u32,
    pub height: u32,
}

impl AssembledRequest {
    /// All text parts joined with blank lines. Stored as the result's prompt.
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                RequestPart::Text(text) => Some(text.as_str()),
                RequestPart::InlineImage(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| matches!(part, RequestPart::InlineImage(_)))
            .count()
    }
}

/// Successful provider output.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub image: ImagePayload,
    /// Model that produced the image, echoed back by the provider.
    pub model: String,
    /// Any text the provider returned alongside the image.
    pub provider_text: Option<String>,
}

/// Upstream generation failures. Surfaced to users as "please try again".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("provider returned no image")]
    NoOutputProduced,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("provider timed out")]
    Timeout,
}

/// "Generate an image from a multi-part prompt."
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &AssembledRequest) -> Result<GeneratedImage, GenerationError>;
}

// ---------------------------------------------------------------------------
// Reference search
// ---------------------------------------------------------------------------

/// One hit from the reference search provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    /// Popularity signal used for filtering (e.g. view count).
    pub popularity: u64,
}

/// Failure of a search or fetch call. References are best-effort, so the
/// message is only ever logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CapabilityError(pub String);

/// "Search reference images for a query." Results are in relevance order.
#[async_trait]
pub trait ReferenceSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchHit>, CapabilityError>;
}

/// Downloads the bytes behind a reference image URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ImagePayload, CapabilityError>;
}
