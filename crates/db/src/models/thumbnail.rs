//! `thumbnails` rows (generation history).

use serde::Serialize;
use sqlx::FromRow;
use thumbforge_core::history::GenerationResult;
use thumbforge_core::types::{RecordId, Timestamp};

/// A row from the `thumbnails` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Thumbnail {
    pub id: RecordId,
    pub user_id: String,
    pub topic: String,
    pub prompt: String,
    pub image_url: String,
    pub ctr_score: Option<f32>,
    pub ctr_analysis: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Thumbnail> for GenerationResult {
    fn from(row: Thumbnail) -> Self {
        GenerationResult {
            id: row.id,
            user_id: row.user_id,
            topic: row.topic,
            prompt: row.prompt,
            image_url: row.image_url,
            ctr_score: row.ctr_score,
            ctr_analysis: row.ctr_analysis,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
