//! Persistence seams for the core services.
//!
//! Every method that checks and mutates a balance must do so atomically for a
//! single `user_id`: the SQL adapters use conditional single-statement updates,
//! the in-memory adapters hold one lock across the check and the write.

use async_trait::async_trait;

use crate::entitlement::{CreditKind, EntitlementRecord};
use crate::error::CoreError;
use crate::history::{GenerationResult, NewGenerationResult};
use crate::regenerate::{NewRegenerateSession, RegenerateSession};
use crate::types::{RecordId, Timestamp};

/// Storage for [`EntitlementRecord`]s, keyed by user id.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn find(&self, user_id: &str) -> Result<Option<EntitlementRecord>, CoreError>;

    /// Insert a zero-balance record unless one already exists for `user_id`.
    /// Returns whichever row is stored afterwards.
    async fn insert_if_absent(
        &self,
        user_id: &str,
        email: &str,
        is_admin: bool,
    ) -> Result<EntitlementRecord, CoreError>;

    /// Overwrite the stored email and admin flag. Balances are untouched.
    async fn set_identity(
        &self,
        user_id: &str,
        email: &str,
        is_admin: bool,
    ) -> Result<Option<EntitlementRecord>, CoreError>;

    /// Decrement the balance for `kind` by one if it is positive.
    ///
    /// Returns `None` when the user does not exist or the balance is zero.
    async fn try_decrement(
        &self,
        user_id: &str,
        kind: CreditKind,
    ) -> Result<Option<EntitlementRecord>, CoreError>;

    /// Flip `has_used_free_preview` from false to true.
    ///
    /// Returns `None` when the user does not exist or the flag was already set.
    async fn mark_free_preview_used(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, CoreError>;

    /// Clear `has_used_free_preview`. Admin override only.
    async fn reset_free_preview(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, CoreError>;

    /// Add signed deltas to both balances, flooring each result at zero.
    async fn apply_delta(
        &self,
        user_id: &str,
        thumbnails: i32,
        regenerates: i32,
    ) -> Result<Option<EntitlementRecord>, CoreError>;

    /// Set both balances to zero in one step, skipping admin records.
    ///
    /// Returns `None` when the user does not exist or is an admin.
    async fn zero_balances(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, CoreError>;

    /// Remove the record. Returns `true` if a row was deleted.
    async fn delete(&self, user_id: &str) -> Result<bool, CoreError>;

    /// All records, most recently created first.
    async fn list(&self) -> Result<Vec<EntitlementRecord>, CoreError>;
}

/// Storage for short-lived regenerate sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, input: NewRegenerateSession) -> Result<RegenerateSession, CoreError>;

    /// The most recently created session for `user_id` with `expires_at > now`.
    async fn find_active(
        &self,
        user_id: &str,
        now: Timestamp,
    ) -> Result<Option<RegenerateSession>, CoreError>;

    /// Delete one session, but only if `user_id` owns it. Expired sessions
    /// are deleted too. Returns `true` if a row was deleted.
    async fn delete_owned(&self, id: RecordId, user_id: &str) -> Result<bool, CoreError>;

    /// Returns the number of rows deleted.
    async fn delete_for_user(&self, user_id: &str) -> Result<u64, CoreError>;

    /// Number of sessions with `expires_at > now`.
    async fn count_active(&self, now: Timestamp) -> Result<u64, CoreError>;
}

/// Storage for generated thumbnails (the user's history).
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn insert(&self, input: NewGenerationResult) -> Result<GenerationResult, CoreError>;

    async fn find(&self, id: RecordId) -> Result<Option<GenerationResult>, CoreError>;

    /// All results for a user, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<GenerationResult>, CoreError>;

    /// Returns `true` if a row was deleted.
    async fn delete(&self, id: RecordId) -> Result<bool, CoreError>;

    /// Returns the number of rows deleted.
    async fn delete_for_user(&self, user_id: &str) -> Result<u64, CoreError>;

    async fn count(&self) -> Result<u64, CoreError>;
}
