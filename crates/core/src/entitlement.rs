//! Credit entitlements: free preview, paid balances, and admin override.
//!
//! The [`EntitlementLedger`] is the only component that mutates balances. All
//! check-and-decrement work is delegated to [`EntitlementStore`] methods that
//! are atomic per user, so two concurrent consumes against a balance of one
//! produce exactly one success.
//!
//! Admin status is never written into the balance columns. A record keeps its
//! real counters while `is_admin` is set and [`Balance::Unlimited`] is derived
//! for display, so demoting an admin reveals the balance they had before.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::CoreError;
use crate::store::{EntitlementStore, ResultStore};
use crate::types::{Timestamp, UserId};

// ---------------------------------------------------------------------------
// Record and value types
// ---------------------------------------------------------------------------

/// One row per user in the entitlement ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub user_id: UserId,
    pub email: String,
    pub thumbnails_remaining: i32,
    pub regenerates_remaining: i32,
    pub is_admin: bool,
    pub has_used_free_preview: bool,
    pub last_updated: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EntitlementRecord {
    /// A fresh zero-balance record.
    pub fn new(user_id: &str, email: &str, is_admin: bool, now: Timestamp) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            thumbnails_remaining: 0,
            regenerates_remaining: 0,
            is_admin,
            has_used_free_preview: false,
            last_updated: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Real stored balance for `kind`.
    pub fn remaining(&self, kind: CreditKind) -> i32 {
        match kind {
            CreditKind::Thumbnail => self.thumbnails_remaining,
            CreditKind::Regenerate => self.regenerates_remaining,
        }
    }

    pub fn thumbnails_display(&self) -> Balance {
        self.display(CreditKind::Thumbnail)
    }

    pub fn regenerates_display(&self) -> Balance {
        self.display(CreditKind::Regenerate)
    }

    fn display(&self, kind: CreditKind) -> Balance {
        if self.is_admin {
            Balance::Unlimited
        } else {
            Balance::Finite(self.remaining(kind))
        }
    }
}

/// A balance as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Balance {
    Finite(i32),
    Unlimited,
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Balance::Finite(n) => serializer.serialize_i32(*n),
            Balance::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Balance::Finite(n) => write!(f, "{n}"),
            Balance::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// The kind of paid action a credit is spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    Thumbnail,
    Regenerate,
}

impl CreditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditKind::Thumbnail => "thumbnail",
            CreditKind::Regenerate => "regenerate",
        }
    }
}

impl fmt::Display for CreditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purchasable credit packs. Amounts are `(thumbnails, regenerates)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditPackage {
    Starter,
    Creator,
    Studio,
}

impl CreditPackage {
    pub fn amounts(&self) -> (i32, i32) {
        match self {
            CreditPackage::Starter => (1, 2),
            CreditPackage::Creator => (10, 20),
            CreditPackage::Studio => (50, 100),
        }
    }
}

// ---------------------------------------------------------------------------
// Privilege policy
// ---------------------------------------------------------------------------

/// Decides whether an identity's email grants unlimited access.
pub trait PrivilegePolicy: Send + Sync {
    fn is_privileged(&self, email: &str) -> bool;
}

/// Case-insensitive allow-list of admin emails.
#[derive(Debug, Clone, Default)]
pub struct AdminEmails {
    emails: HashSet<String>,
}

impl AdminEmails {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list such as the `ADMIN_EMAILS` env var.
    pub fn from_csv(csv: &str) -> Self {
        Self::new(csv.split(','))
    }
}

impl PrivilegePolicy for AdminEmails {
    fn is_privileged(&self, email: &str) -> bool {
        self.emails.contains(&email.trim().to_lowercase())
    }
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

/// Answer to a "may this user do X" question.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub record: EntitlementRecord,
}

/// Result of a consume attempt. Failures carry the unchanged record.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumeOutcome {
    pub success: bool,
    pub record: EntitlementRecord,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FreePreviewCheck {
    pub can_generate: bool,
    pub message: String,
    pub record: EntitlementRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadCheck {
    pub can_download: bool,
    pub message: String,
    pub record: EntitlementRecord,
}

/// Credits to add after the payment collaborator confirms a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditGrant {
    pub thumbnails: i32,
    pub regenerates: i32,
}

impl CreditGrant {
    pub fn from_package(package: CreditPackage) -> Self {
        let (thumbnails, regenerates) = package.amounts();
        Self {
            thumbnails,
            regenerates,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.thumbnails < 0 || self.regenerates < 0 {
            return Err(CoreError::Validation(
                "Granted credit amounts must not be negative".to_string(),
            ));
        }
        if self.thumbnails == 0 && self.regenerates == 0 {
            return Err(CoreError::Validation(
                "A credit grant must add at least one credit".to_string(),
            ));
        }
        Ok(())
    }
}

/// How a generation will be paid for, resolved before any external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargePath {
    Admin,
    FreePreview,
    Credit(CreditKind),
}

/// Aggregate counts for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub admin_users: u64,
    pub free_previews_used: u64,
    /// Sum of finite thumbnail balances (admins excluded).
    pub thumbnails_outstanding: i64,
    /// Sum of finite regenerate balances (admins excluded).
    pub regenerates_outstanding: i64,
    pub total_thumbnails_generated: u64,
    pub active_regenerate_sessions: u64,
}

impl AdminStats {
    pub fn from_records(
        records: &[EntitlementRecord],
        total_thumbnails_generated: u64,
        active_regenerate_sessions: u64,
    ) -> Self {
        let mut stats = AdminStats {
            total_thumbnails_generated,
            active_regenerate_sessions,
            ..Default::default()
        };
        for record in records {
            stats.total_users += 1;
            if record.has_used_free_preview {
                stats.free_previews_used += 1;
            }
            if record.is_admin {
                stats.admin_users += 1;
            } else {
                stats.thumbnails_outstanding += i64::from(record.thumbnails_remaining);
                stats.regenerates_outstanding += i64::from(record.regenerates_remaining);
            }
        }
        stats
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

const PURCHASE_PROMPT: &str = "Purchase a credit pack to continue.";

fn denied_message(kind: CreditKind) -> String {
    format!("No {kind} credits remaining. {PURCHASE_PROMPT}")
}

/// Build an [`CoreError::EntitlementDenied`] carrying the current balances.
pub fn entitlement_denied(record: &EntitlementRecord, reason: impl Into<String>) -> CoreError {
    CoreError::EntitlementDenied {
        reason: reason.into(),
        thumbnails_remaining: record.thumbnails_display(),
        regenerates_remaining: record.regenerates_display(),
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Per-user entitlement bookkeeping.
pub struct EntitlementLedger {
    store: Arc<dyn EntitlementStore>,
    results: Arc<dyn ResultStore>,
    policy: Arc<dyn PrivilegePolicy>,
}

impl EntitlementLedger {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        results: Arc<dyn ResultStore>,
        policy: Arc<dyn PrivilegePolicy>,
    ) -> Self {
        Self {
            store,
            results,
            policy,
        }
    }

    pub fn is_privileged(&self, email: &str) -> bool {
        self.policy.is_privileged(email)
    }

    /// Return the user's record, creating it on first sight.
    ///
    /// The admin flag is resynchronised from `email` on every call. Balances
    /// are never touched by a promotion or demotion.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<EntitlementRecord, CoreError> {
        if user_id.trim().is_empty() {
            return Err(CoreError::Validation("user id must not be empty".to_string()));
        }
        let privileged = self.policy.is_privileged(email);

        let record = match self.store.find(user_id).await? {
            Some(record) => record,
            None => {
                let record = self.store.insert_if_absent(user_id, email, privileged).await?;
                tracing::info!(user_id, is_admin = record.is_admin, "Created entitlement record");
                record
            }
        };

        if record.is_admin == privileged && record.email == email {
            return Ok(record);
        }

        if record.is_admin != privileged {
            tracing::info!(
                user_id,
                from = record.is_admin,
                to = privileged,
                "Resynchronising admin flag"
            );
        }
        self.store
            .set_identity(user_id, email, privileged)
            .await?
            .ok_or_else(|| CoreError::not_found("EntitlementRecord", user_id))
    }

    /// Fetch an existing record.
    pub async fn get(&self, user_id: &str) -> Result<EntitlementRecord, CoreError> {
        self.store
            .find(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("EntitlementRecord", user_id))
    }

    pub async fn list_users(&self) -> Result<Vec<EntitlementRecord>, CoreError> {
        self.store.list().await
    }

    /// Allowed iff admin, the free preview is unused, or a thumbnail credit remains.
    pub async fn can_consume_free_preview(&self, user_id: &str) -> Result<Decision, CoreError> {
        let record = self.get(user_id).await?;
        let allowed =
            record.is_admin || !record.has_used_free_preview || record.thumbnails_remaining > 0;
        Ok(Decision { allowed, record })
    }

    /// Mark the free preview as used. Succeeds exactly once for non-admins.
    pub async fn consume_free_preview(&self, user_id: &str) -> Result<ConsumeOutcome, CoreError> {
        if let Some(record) = self.store.mark_free_preview_used(user_id).await? {
            tracing::info!(user_id, "Free preview consumed");
            return Ok(ConsumeOutcome {
                success: true,
                record,
                message: None,
            });
        }

        let record = self.get(user_id).await?;
        if record.is_admin {
            return Ok(ConsumeOutcome {
                success: true,
                record,
                message: None,
            });
        }
        Ok(ConsumeOutcome {
            success: false,
            record,
            message: Some(format!("Free preview already used. {PURCHASE_PROMPT}")),
        })
    }

    /// Allowed iff admin or the balance for `kind` is positive.
    pub async fn can_consume(&self, kind: CreditKind, user_id: &str) -> Result<Decision, CoreError> {
        let record = self.get(user_id).await?;
        let allowed = record.is_admin || record.remaining(kind) > 0;
        Ok(Decision { allowed, record })
    }

    /// Spend one credit of `kind`. Admins succeed without any mutation.
    pub async fn consume(&self, kind: CreditKind, user_id: &str) -> Result<ConsumeOutcome, CoreError> {
        let record = self.get(user_id).await?;
        if record.is_admin {
            return Ok(ConsumeOutcome {
                success: true,
                record,
                message: None,
            });
        }

        match self.store.try_decrement(user_id, kind).await? {
            Some(record) => {
                tracing::info!(
                    user_id,
                    %kind,
                    remaining = record.remaining(kind),
                    "Credit consumed"
                );
                Ok(ConsumeOutcome {
                    success: true,
                    record,
                    message: None,
                })
            }
            None => {
                let record = self.get(user_id).await?;
                Ok(ConsumeOutcome {
                    success: false,
                    record,
                    message: Some(denied_message(kind)),
                })
            }
        }
    }

    /// Apply signed deltas; each resulting balance is clamped at zero.
    pub async fn adjust(
        &self,
        user_id: &str,
        delta_thumbnails: i32,
        delta_regenerates: i32,
    ) -> Result<EntitlementRecord, CoreError> {
        let record = self
            .store
            .apply_delta(user_id, delta_thumbnails, delta_regenerates)
            .await?
            .ok_or_else(|| CoreError::not_found("EntitlementRecord", user_id))?;
        tracing::info!(
            user_id,
            delta_thumbnails,
            delta_regenerates,
            thumbnails = record.thumbnails_remaining,
            regenerates = record.regenerates_remaining,
            "Balances adjusted"
        );
        Ok(record)
    }

    /// Credit a confirmed purchase. The record is created if the buyer has
    /// never been seen before.
    pub async fn grant_credits(
        &self,
        user_id: &str,
        email: Option<&str>,
        grant: CreditGrant,
    ) -> Result<EntitlementRecord, CoreError> {
        grant.validate()?;
        if let Some(email) = email {
            self.get_or_create(user_id, email).await?;
        }
        self.adjust(user_id, grant.thumbnails, grant.regenerates).await
    }

    /// Zero both balances. Forbidden on admin targets.
    pub async fn block(&self, user_id: &str) -> Result<EntitlementRecord, CoreError> {
        match self.store.zero_balances(user_id).await? {
            Some(record) => {
                tracing::info!(user_id, "User blocked");
                Ok(record)
            }
            // Missing becomes NotFound here; otherwise the target is an admin.
            None => {
                self.get(user_id).await?;
                Err(CoreError::Forbidden("Admin users cannot be blocked".to_string()))
            }
        }
    }

    /// Delete the user's history and then their record. Forbidden on admins.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), CoreError> {
        let record = self.get(user_id).await?;
        if record.is_admin {
            return Err(CoreError::Forbidden("Admin users cannot be deleted".to_string()));
        }
        let removed = self.results.delete_for_user(user_id).await?;
        self.store.delete(user_id).await?;
        tracing::info!(user_id, removed_thumbnails = removed, "User deleted");
        Ok(())
    }

    /// Admin override: let the user have another free preview.
    pub async fn reset_free_preview(&self, user_id: &str) -> Result<EntitlementRecord, CoreError> {
        let record = self
            .store
            .reset_free_preview(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("EntitlementRecord", user_id))?;
        tracing::info!(user_id, "Free preview reset");
        Ok(record)
    }

    // ---- caller-facing checks ----

    pub async fn check_free_preview(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<FreePreviewCheck, CoreError> {
        let record = self.get_or_create(user_id, email).await?;
        let (can_generate, message) = if record.is_admin {
            (true, "Unlimited access".to_string())
        } else if !record.has_used_free_preview {
            (true, "Your free preview is available".to_string())
        } else if record.thumbnails_remaining > 0 {
            (
                true,
                format!("{} thumbnail credits remaining", record.thumbnails_remaining),
            )
        } else {
            (
                false,
                format!("You have used your free preview. {PURCHASE_PROMPT}"),
            )
        };
        Ok(FreePreviewCheck {
            can_generate,
            message,
            record,
        })
    }

    /// Full-resolution downloads need a paid thumbnail credit (or admin).
    pub async fn check_download_allowed(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<DownloadCheck, CoreError> {
        let record = self.get_or_create(user_id, email).await?;
        let (can_download, message) = if record.is_admin {
            (true, "Unlimited access".to_string())
        } else if record.thumbnails_remaining > 0 {
            (
                true,
                format!("{} thumbnail credits remaining", record.thumbnails_remaining),
            )
        } else {
            (
                false,
                format!("Downloading requires a thumbnail credit. {PURCHASE_PROMPT}"),
            )
        };
        Ok(DownloadCheck {
            can_download,
            message,
            record,
        })
    }

    // ---- generation support ----

    /// Decide how a generation of `kind` would be paid for, without mutating.
    ///
    /// Thumbnails use the free preview first, then paid credits. Regenerations
    /// always need a regenerate credit.
    pub async fn resolve_charge(
        &self,
        user_id: &str,
        kind: CreditKind,
    ) -> Result<ChargePath, CoreError> {
        let record = self.get(user_id).await?;
        if record.is_admin {
            return Ok(ChargePath::Admin);
        }
        if kind == CreditKind::Thumbnail && !record.has_used_free_preview {
            return Ok(ChargePath::FreePreview);
        }
        if record.remaining(kind) > 0 {
            return Ok(ChargePath::Credit(kind));
        }
        let reason = if kind == CreditKind::Thumbnail {
            format!("You have used your free preview. {PURCHASE_PROMPT}")
        } else {
            denied_message(kind)
        };
        Err(entitlement_denied(&record, reason))
    }

    /// Finalise the charge resolved by [`resolve_charge`](Self::resolve_charge).
    ///
    /// Fails with `EntitlementDenied` if a concurrent request spent the
    /// entitlement in the meantime.
    pub async fn settle(&self, user_id: &str, path: ChargePath) -> Result<EntitlementRecord, CoreError> {
        let outcome = match path {
            ChargePath::Admin => return self.get(user_id).await,
            ChargePath::FreePreview => {
                let outcome = self.consume_free_preview(user_id).await?;
                if outcome.success {
                    outcome
                } else {
                    // Another request used the preview first; fall back to a paid credit.
                    self.consume(CreditKind::Thumbnail, user_id).await?
                }
            }
            ChargePath::Credit(kind) => self.consume(kind, user_id).await?,
        };
        if outcome.success {
            Ok(outcome.record)
        } else {
            let reason = outcome
                .message
                .unwrap_or_else(|| PURCHASE_PROMPT.to_string());
            Err(entitlement_denied(&outcome.record, reason))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
