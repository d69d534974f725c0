//! `user_entitlements` rows.

use serde::Serialize;
use sqlx::FromRow;
use thumbforge_core::entitlement::EntitlementRecord;
use thumbforge_core::types::Timestamp;

/// A row from the `user_entitlements` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserEntitlement {
    pub user_id: String,
    pub email: String,
    pub thumbnails_remaining: i32,
    pub regenerates_remaining: i32,
    pub is_admin: bool,
    pub has_used_free_preview: bool,
    pub last_updated: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<UserEntitlement> for EntitlementRecord {
    fn from(row: UserEntitlement) -> Self {
        EntitlementRecord {
            user_id: row.user_id,
            email: row.email,
            thumbnails_remaining: row.thumbnails_remaining,
            regenerates_remaining: row.regenerates_remaining,
            is_admin: row.is_admin,
            has_used_free_preview: row.has_used_free_preview,
            last_updated: row.last_updated,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
