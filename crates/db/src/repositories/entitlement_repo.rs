//! Repository for the `user_entitlements` table.
//!
//! Every balance change is a single conditional statement, so concurrent
//! requests for the same user serialise on the row lock and a balance can
//! never go below zero.

use sqlx::PgPool;
use thumbforge_core::entitlement::CreditKind;

use crate::models::entitlement::UserEntitlement;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    user_id, email, thumbnails_remaining, regenerates_remaining, is_admin, \
    has_used_free_preview, last_updated, created_at, updated_at";

/// Balance column for a credit kind. Only ever interpolates these literals.
fn balance_column(kind: CreditKind) -> &'static str {
    match kind {
        CreditKind::Thumbnail => "thumbnails_remaining",
        CreditKind::Regenerate => "regenerates_remaining",
    }
}

/// Provides entitlement operations.
pub struct EntitlementRepo;

impl EntitlementRepo {
    /// Find a record by user id.
    pub async fn find_by_user(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Option<UserEntitlement>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_entitlements WHERE user_id = $1");
        sqlx::query_as::<_, UserEntitlement>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a zero-balance record if none exists, then return the stored row.
    ///
    /// The follow-up `SELECT` runs as its own statement so it sees a row a
    /// concurrent request inserted first.
    pub async fn insert_if_absent(
        pool: &PgPool,
        user_id: &str,
        email: &str,
        is_admin: bool,
    ) -> Result<UserEntitlement, sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_entitlements (user_id, email, is_admin) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(email)
        .bind(is_admin)
        .execute(pool)
        .await?;

        let query = format!("SELECT {COLUMNS} FROM user_entitlements WHERE user_id = $1");
        sqlx::query_as::<_, UserEntitlement>(&query)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Overwrite email and admin flag. Balances are untouched.
    pub async fn set_identity(
        pool: &PgPool,
        user_id: &str,
        email: &str,
        is_admin: bool,
    ) -> Result<Option<UserEntitlement>, sqlx::Error> {
        let query = format!(
            "UPDATE user_entitlements \
             SET email = $2, is_admin = $3, last_updated = NOW() \
             WHERE user_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserEntitlement>(&query)
            .bind(user_id)
            .bind(email)
            .bind(is_admin)
            .fetch_optional(pool)
            .await
    }

    /// Decrement one balance by 1 if it is positive. `None` when the user is
    /// missing or the balance is already zero.
    pub async fn try_decrement(
        pool: &PgPool,
        user_id: &str,
        kind: CreditKind,
    ) -> Result<Option<UserEntitlement>, sqlx::Error> {
        let column = balance_column(kind);
        let query = format!(
            "UPDATE user_entitlements \
             SET {column} = {column} - 1, last_updated = NOW() \
             WHERE user_id = $1 AND {column} > 0 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserEntitlement>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Flip `has_used_free_preview` to true. `None` if it was already set.
    pub async fn mark_free_preview_used(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Option<UserEntitlement>, sqlx::Error> {
        let query = format!(
            "UPDATE user_entitlements \
             SET has_used_free_preview = true, last_updated = NOW() \
             WHERE user_id = $1 AND has_used_free_preview = false \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserEntitlement>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn reset_free_preview(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Option<UserEntitlement>, sqlx::Error> {
        let query = format!(
            "UPDATE user_entitlements \
             SET has_used_free_preview = false, last_updated = NOW() \
             WHERE user_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserEntitlement>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Apply signed deltas, clamping each balance into `0..=i32::MAX`.
    pub async fn apply_delta(
        pool: &PgPool,
        user_id: &str,
        thumbnails: i32,
        regenerates: i32,
    ) -> Result<Option<UserEntitlement>, sqlx::Error> {
        let query = format!(
            "UPDATE user_entitlements SET \
                thumbnails_remaining = \
                    LEAST(GREATEST(0, thumbnails_remaining::BIGINT + $2), 2147483647)::INT, \
                regenerates_remaining = \
                    LEAST(GREATEST(0, regenerates_remaining::BIGINT + $3), 2147483647)::INT, \
                last_updated = NOW() \
             WHERE user_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserEntitlement>(&query)
            .bind(user_id)
            .bind(i64::from(thumbnails))
            .bind(i64::from(regenerates))
            .fetch_optional(pool)
            .await
    }

    /// Zero both balances of a non-admin record in one statement.
    pub async fn zero_balances(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Option<UserEntitlement>, sqlx::Error> {
        let query = format!(
            "UPDATE user_entitlements \
             SET thumbnails_remaining = 0, regenerates_remaining = 0, last_updated = NOW() \
             WHERE user_id = $1 AND is_admin = false \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserEntitlement>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete the user's thumbnails and entitlement row in one transaction.
    /// Returns `true` if the entitlement row existed.
    pub async fn delete_with_history(pool: &PgPool, user_id: &str) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM thumbnails WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM user_entitlements WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all records, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<UserEntitlement>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_entitlements ORDER BY created_at DESC");
        sqlx::query_as::<_, UserEntitlement>(&query)
            .fetch_all(pool)
            .await
    }
}
