//! Base64 image uploads embedded in JSON bodies.

use base64::Engine;
use serde::Deserialize;
use thumbforge_core::types::ImagePayload;

use crate::error::{AppError, AppResult};

/// Largest decoded upload accepted.
pub const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

/// `{ "mime_type": "image/png", "data": "<base64>" }`
#[derive(Debug, Deserialize)]
pub struct ImageUpload {
    pub mime_type: String,
    pub data: String,
}

impl ImageUpload {
    pub fn decode(self) -> AppResult<ImagePayload> {
        let mime_type = self.mime_type.trim().to_ascii_lowercase();
        if !mime_type.starts_with("image/") {
            return Err(AppError::BadRequest(format!(
                "Unsupported upload type '{mime_type}'"
            )));
        }

        // Accept data URLs as well as bare base64.
        let encoded = match self.data.split_once(";base64,") {
            Some((_, rest)) => rest,
            None => self.data.as_str(),
        };
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::BadRequest(format!("Image data is not valid base64: {e}")))?;

        if data.is_empty() {
            return Err(AppError::BadRequest("Image data is empty".into()));
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::BadRequest(format!(
                "Image exceeds {MAX_UPLOAD_BYTES} bytes"
            )));
        }
        Ok(ImagePayload::new(mime_type, data))
    }
}

pub fn decode_optional(upload: Option<ImageUpload>) -> AppResult<Option<ImagePayload>> {
    upload.map(ImageUpload::decode).transpose()
}
