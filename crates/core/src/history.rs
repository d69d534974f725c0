//! Generated thumbnails ("history"), owned exclusively by the requesting user.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::store::ResultStore;
use crate::types::{RecordId, Timestamp, UserId};

/// A persisted generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub id: RecordId,
    pub user_id: UserId,
    pub topic: String,
    /// The fully assembled prompt text sent to the provider.
    pub prompt: String,
    /// `data:` URL of the generated image.
    pub image_url: String,
    /// Advisory click-through estimate, filled in by an external analyser.
    pub ctr_score: Option<f32>,
    pub ctr_analysis: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new result.
#[derive(Debug, Clone)]
pub struct NewGenerationResult {
    pub user_id: UserId,
    pub topic: String,
    pub prompt: String,
    pub image_url: String,
}

/// Owner-scoped access to a user's generated thumbnails.
pub struct ThumbnailHistory {
    store: Arc<dyn ResultStore>,
}

impl ThumbnailHistory {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<GenerationResult>, CoreError> {
        self.store.list_for_user(user_id).await
    }

    /// Fetch one result. Another user's result is reported as not found.
    pub async fn get(&self, user_id: &str, id: RecordId) -> Result<GenerationResult, CoreError> {
        match self.store.find(id).await? {
            Some(result) if result.user_id == user_id => Ok(result),
            _ => Err(CoreError::not_found("Thumbnail", id)),
        }
    }

    pub async fn delete(&self, user_id: &str, id: RecordId) -> Result<(), CoreError> {
        self.get(user_id, id).await?;
        self.store.delete(id).await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64, CoreError> {
        self.store.count().await
    }
}
