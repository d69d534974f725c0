/// Opaque, stable user identifier supplied by the identity service.
pub type UserId = String;

/// Primary key for sessions and generated thumbnails.
pub type RecordId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Raw image bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Encode as a `data:` URL suitable for storing in `image_url`.
    pub fn to_data_url(&self) -> String {
        use base64::Engine;
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// File extension for a MIME type, used when spooling images to disk.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_carries_mime_and_base64_body() {
        let payload = ImagePayload::new("image/png", vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(payload.to_data_url(), "data:image/png;base64,3q2+7w==");
    }

    #[test]
    fn unknown_mime_falls_back_to_jpg() {
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("application/octet-stream"), "jpg");
    }
}
