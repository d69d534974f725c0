//! Downloads reference image bytes over HTTP.

use async_trait::async_trait;
use thumbforge_core::provider::{CapabilityError, ImageFetcher};
use thumbforge_core::types::ImagePayload;

/// Images larger than this are rejected rather than sent to the generator.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Not an image: {0}")]
    NotAnImage(String),

    #[error("Image too large ({size} bytes, limit {limit})")]
    TooLarge { size: usize, limit: usize },
}

/// Resolve the MIME type of a downloaded body. A missing header falls back
/// to JPEG, which is what thumbnail CDNs serve.
pub fn image_mime(content_type: Option<&str>) -> Result<String, FetchError> {
    let Some(raw) = content_type else {
        return Ok("image/jpeg".to_string());
    };
    let mime = raw
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if mime.starts_with("image/") {
        Ok(mime)
    } else {
        Err(FetchError::NotAnImage(mime))
    }
}

pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new(), DEFAULT_MAX_IMAGE_BYTES)
    }

    pub fn with_client(client: reqwest::Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    pub async fn download(&self, url: &str) -> Result<ImagePayload, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(FetchError::TooLarge {
                    size: usize::try_from(length).unwrap_or(usize::MAX),
                    limit: self.max_bytes,
                });
            }
        }

        let mime = image_mime(
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        )?;

        let bytes = response.bytes().await?;
        if bytes.len() > self.max_bytes {
            return Err(FetchError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }
        Ok(ImagePayload::new(mime, bytes.to_vec()))
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<ImagePayload, CapabilityError> {
        self.download(url)
            .await
            .map_err(|e| CapabilityError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn content_type_parameters_are_stripped() {
        assert_eq!(image_mime(Some("image/WEBP; charset=binary")).unwrap(), "image/webp");
        assert_eq!(image_mime(None).unwrap(), "image/jpeg");
    }

    #[test]
    fn non_image_content_is_rejected() {
        assert_matches!(
            image_mime(Some("text/html; charset=utf-8")),
            Err(FetchError::NotAnImage(mime)) if mime == "text/html"
        );
    }
}
