//! Postgres-backed implementations of the core store traits.

use async_trait::async_trait;
use sqlx::PgPool;
use thumbforge_core::entitlement::{CreditKind, EntitlementRecord};
use thumbforge_core::error::CoreError;
use thumbforge_core::history::{GenerationResult, NewGenerationResult};
use thumbforge_core::regenerate::{NewRegenerateSession, RegenerateSession};
use thumbforge_core::store::{EntitlementStore, ResultStore, SessionStore};
use thumbforge_core::types::{RecordId, Timestamp};

use crate::repositories::{EntitlementRepo, RegenerateSessionRepo, ThumbnailRepo};

/// Map a database error into the domain taxonomy. The detail is logged, not
/// surfaced.
fn persistence(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Database error");
    CoreError::Persistence(err.to_string())
}

fn to_u64(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Entitlements
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgEntitlementStore {
    pool: PgPool,
}

impl PgEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntitlementStore for PgEntitlementStore {
    async fn find(&self, user_id: &str) -> Result<Option<EntitlementRecord>, CoreError> {
        let row = EntitlementRepo::find_by_user(&self.pool, user_id)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn insert_if_absent(
        &self,
        user_id: &str,
        email: &str,
        is_admin: bool,
    ) -> Result<EntitlementRecord, CoreError> {
        let row = EntitlementRepo::insert_if_absent(&self.pool, user_id, email, is_admin)
            .await
            .map_err(persistence)?;
        Ok(row.into())
    }

    async fn set_identity(
        &self,
        user_id: &str,
        email: &str,
        is_admin: bool,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let row = EntitlementRepo::set_identity(&self.pool, user_id, email, is_admin)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn try_decrement(
        &self,
        user_id: &str,
        kind: CreditKind,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let row = EntitlementRepo::try_decrement(&self.pool, user_id, kind)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn mark_free_preview_used(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let row = EntitlementRepo::mark_free_preview_used(&self.pool, user_id)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn reset_free_preview(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let row = EntitlementRepo::reset_free_preview(&self.pool, user_id)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn apply_delta(
        &self,
        user_id: &str,
        thumbnails: i32,
        regenerates: i32,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let row = EntitlementRepo::apply_delta(&self.pool, user_id, thumbnails, regenerates)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn zero_balances(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, CoreError> {
        let row = EntitlementRepo::zero_balances(&self.pool, user_id)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    /// Removes any remaining thumbnails in the same transaction.
    async fn delete(&self, user_id: &str) -> Result<bool, CoreError> {
        EntitlementRepo::delete_with_history(&self.pool, user_id)
            .await
            .map_err(persistence)
    }

    async fn list(&self) -> Result<Vec<EntitlementRecord>, CoreError> {
        let rows = EntitlementRepo::list(&self.pool).await.map_err(persistence)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// Regenerate sessions
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, input: NewRegenerateSession) -> Result<RegenerateSession, CoreError> {
        let row = RegenerateSessionRepo::create(&self.pool, &input)
            .await
            .map_err(persistence)?;
        Ok(row.into())
    }

    async fn find_active(
        &self,
        user_id: &str,
        now: Timestamp,
    ) -> Result<Option<RegenerateSession>, CoreError> {
        let row = RegenerateSessionRepo::find_active(&self.pool, user_id, now)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn delete_owned(&self, id: RecordId, user_id: &str) -> Result<bool, CoreError> {
        RegenerateSessionRepo::delete_owned(&self.pool, id, user_id)
            .await
            .map_err(persistence)
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<u64, CoreError> {
        RegenerateSessionRepo::delete_for_user(&self.pool, user_id)
            .await
            .map_err(persistence)
    }

    async fn count_active(&self, now: Timestamp) -> Result<u64, CoreError> {
        RegenerateSessionRepo::count_active(&self.pool, now)
            .await
            .map(to_u64)
            .map_err(persistence)
    }
}

// ---------------------------------------------------------------------------
// Generation results
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn insert(&self, input: NewGenerationResult) -> Result<GenerationResult, CoreError> {
        let row = ThumbnailRepo::create(&self.pool, &input)
            .await
            .map_err(persistence)?;
        Ok(row.into())
    }

    async fn find(&self, id: RecordId) -> Result<Option<GenerationResult>, CoreError> {
        let row = ThumbnailRepo::find_by_id(&self.pool, id)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<GenerationResult>, CoreError> {
        let rows = ThumbnailRepo::list_for_user(&self.pool, user_id)
            .await
            .map_err(persistence)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, id: RecordId) -> Result<bool, CoreError> {
        ThumbnailRepo::delete(&self.pool, id).await.map_err(persistence)
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<u64, CoreError> {
        ThumbnailRepo::delete_for_user(&self.pool, user_id)
            .await
            .map_err(persistence)
    }

    async fn count(&self) -> Result<u64, CoreError> {
        ThumbnailRepo::count(&self.pool)
            .await
            .map(to_u64)
            .map_err(persistence)
    }
}
