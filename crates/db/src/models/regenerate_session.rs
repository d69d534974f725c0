//! `regenerate_sessions` rows.

use sqlx::FromRow;
use thumbforge_core::regenerate::RegenerateSession;
use thumbforge_core::types::{ImagePayload, RecordId, Timestamp};

/// A row from the `regenerate_sessions` table. The optional user photo is
/// stored inline as bytes plus MIME type.
#[derive(Debug, Clone, FromRow)]
pub struct RegenerateSessionRow {
    pub id: RecordId,
    pub user_id: String,
    pub topic: String,
    pub original_thumbnail_id: Option<RecordId>,
    pub user_image: Option<Vec<u8>>,
    pub user_image_mime: Option<String>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl From<RegenerateSessionRow> for RegenerateSession {
    fn from(row: RegenerateSessionRow) -> Self {
        let user_image = match (row.user_image, row.user_image_mime) {
            (Some(data), Some(mime)) => Some(ImagePayload::new(mime, data)),
            _ => None,
        };
        RegenerateSession {
            id: row.id,
            user_id: row.user_id,
            topic: row.topic,
            original_thumbnail_id: row.original_thumbnail_id,
            user_image,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}
