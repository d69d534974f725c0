//! In-memory implementations of the store traits.
//!
//! Each check-and-mutate runs under a single lock acquisition, which gives the
//! same per-user atomicity the SQL adapters get from conditional updates.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::entitlement::{CreditKind, EntitlementRecord};
use crate::error::CoreError;
use crate::history::{GenerationResult, NewGenerationResult};
use crate::regenerate::{NewRegenerateSession, RegenerateSession};
use crate::store::{EntitlementStore, ResultStore, SessionStore};
use crate::types::{RecordId, Timestamp};

// ---------------------------------------------------------------------------
// Entitlements
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryEntitlementStore {
    records: Mutex<HashMap<String, EntitlementRecord>>,
}

impl MemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn touch(record: &mut EntitlementRecord) {
    let now = Utc::now();
    record.last_updated = now;
    record.updated_at = now;
}

#[async_trait]
impl EntitlementStore for MemoryEntitlementStore {
    async fn find(&self, user_id: &str) -> Result<Option<EntitlementRecord>, CoreError> {
        Ok(self.records.lock().await.get(user_id).cloned())
    }

    async fn insert_if_absent(
        &self,
        user_id: &str,
        email: &str,
        is_admin: bool,
    ) -> Result<EntitlementRecord, CoreError> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| EntitlementRecord::new(user_id, email, is_admin, Utc::now()));
        Ok(record.clone())
    }

    async fn set_identity(
        &self,
        user_id: &str,
        email: &str,
        is_admin: bool,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let mut records = self.records.lock().await;
        Ok(records.get_mut(user_id).map(|record| {
            record.email = email.to_string();
            record.is_admin = is_admin;
            touch(record);
            record.clone()
        }))
    }

    async fn try_decrement(
        &self,
        user_id: &str,
        kind: CreditKind,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(user_id) else {
            return Ok(None);
        };
        let balance = match kind {
            CreditKind::Thumbnail => &mut record.thumbnails_remaining,
            CreditKind::Regenerate => &mut record.regenerates_remaining,
        };
        if *balance <= 0 {
            return Ok(None);
        }
        *balance -= 1;
        touch(record);
        Ok(Some(record.clone()))
    }

    async fn mark_free_preview_used(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let mut records = self.records.lock().await;
        match records.get_mut(user_id) {
            Some(record) if !record.has_used_free_preview => {
                record.has_used_free_preview = true;
                touch(record);
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn reset_free_preview(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let mut records = self.records.lock().await;
        Ok(records.get_mut(user_id).map(|record| {
            record.has_used_free_preview = false;
            touch(record);
            record.clone()
        }))
    }

    async fn apply_delta(
        &self,
        user_id: &str,
        thumbnails: i32,
        regenerates: i32,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let mut records = self.records.lock().await;
        Ok(records.get_mut(user_id).map(|record| {
            record.thumbnails_remaining = record.thumbnails_remaining.saturating_add(thumbnails).max(0);
            record.regenerates_remaining =
                record.regenerates_remaining.saturating_add(regenerates).max(0);
            touch(record);
            record.clone()
        }))
    }

    async fn zero_balances(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let mut records = self.records.lock().await;
        match records.get_mut(user_id) {
            Some(record) if !record.is_admin => {
                record.thumbnails_remaining = 0;
                record.regenerates_remaining = 0;
                touch(record);
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, user_id: &str) -> Result<bool, CoreError> {
        Ok(self.records.lock().await.remove(user_id).is_some())
    }

    async fn list(&self) -> Result<Vec<EntitlementRecord>, CoreError> {
        let mut records: Vec<_> = self.records.lock().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Regenerate sessions
// ---------------------------------------------------------------------------

/// Sessions in insertion order; ties on `created_at` resolve to the later insert.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<Vec<RegenerateSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, input: NewRegenerateSession) -> Result<RegenerateSession, CoreError> {
        let session = RegenerateSession {
            id: uuid::Uuid::new_v4(),
            user_id: input.user_id,
            topic: input.topic,
            original_thumbnail_id: input.original_thumbnail_id,
            user_image: input.user_image,
            created_at: input.created_at,
            expires_at: input.expires_at,
        };
        self.sessions.write().await.push(session.clone());
        Ok(session)
    }

    async fn find_active(
        &self,
        user_id: &str,
        now: Timestamp,
    ) -> Result<Option<RegenerateSession>, CoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| s.user_id == user_id && s.is_active_at(now))
            .max_by_key(|(seq, s)| (s.created_at, *seq))
            .map(|(_, s)| s.clone()))
    }

    async fn delete_owned(&self, id: RecordId, user_id: &str) -> Result<bool, CoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|s| !(s.id == id && s.user_id == user_id));
        Ok(sessions.len() < before)
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<u64, CoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn count_active(&self, now: Timestamp) -> Result<u64, CoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.iter().filter(|s| s.is_active_at(now)).count() as u64)
    }
}

// ---------------------------------------------------------------------------
// Generation results
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryResultStore {
    results: RwLock<Vec<GenerationResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn insert(&self, input: NewGenerationResult) -> Result<GenerationResult, CoreError> {
        let now = Utc::now();
        let result = GenerationResult {
            id: uuid::Uuid::new_v4(),
            user_id: input.user_id,
            topic: input.topic,
            prompt: input.prompt,
            image_url: input.image_url,
            ctr_score: None,
            ctr_analysis: None,
            created_at: now,
            updated_at: now,
        };
        self.results.write().await.push(result.clone());
        Ok(result)
    }

    async fn find(&self, id: RecordId) -> Result<Option<GenerationResult>, CoreError> {
        Ok(self.results.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<GenerationResult>, CoreError> {
        // Insertion order reversed gives newest first.
        Ok(self
            .results
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: RecordId) -> Result<bool, CoreError> {
        let mut results = self.results.write().await;
        let before = results.len();
        results.retain(|r| r.id != id);
        Ok(results.len() < before)
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<u64, CoreError> {
        let mut results = self.results.write().await;
        let before = results.len();
        results.retain(|r| r.user_id != user_id);
        Ok((before - results.len()) as u64)
    }

    async fn count(&self) -> Result<u64, CoreError> {
        Ok(self.results.read().await.len() as u64)
    }
}
