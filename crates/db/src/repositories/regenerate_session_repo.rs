//! Repository for the `regenerate_sessions` table.

use sqlx::PgPool;
use thumbforge_core::regenerate::NewRegenerateSession;
use thumbforge_core::types::{RecordId, Timestamp};

use crate::models::regenerate_session::RegenerateSessionRow;

const COLUMNS: &str = "\
    id, user_id, topic, original_thumbnail_id, user_image, user_image_mime, \
    created_at, expires_at";

pub struct RegenerateSessionRepo;

impl RegenerateSessionRepo {
    pub async fn create(
        pool: &PgPool,
        input: &NewRegenerateSession,
    ) -> Result<RegenerateSessionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO regenerate_sessions \
                (id, user_id, topic, original_thumbnail_id, user_image, user_image_mime, \
                 created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        let (image, mime) = match &input.user_image {
            Some(image) => (Some(image.data.as_slice()), Some(image.mime_type.as_str())),
            None => (None, None),
        };
        sqlx::query_as::<_, RegenerateSessionRow>(&query)
            .bind(uuid::Uuid::now_v7())
            .bind(&input.user_id)
            .bind(&input.topic)
            .bind(input.original_thumbnail_id)
            .bind(image)
            .bind(mime)
            .bind(input.created_at)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// The most recently created session for `user_id` that has not expired at `now`.
    pub async fn find_active(
        pool: &PgPool,
        user_id: &str,
        now: Timestamp,
    ) -> Result<Option<RegenerateSessionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM regenerate_sessions \
             WHERE user_id = $1 AND expires_at > $2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, RegenerateSessionRow>(&query)
            .bind(user_id)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Delete by id. Returns `true` if a row was removed.
    pub async fn delete_owned(
        pool: &PgPool,
        id: RecordId,
        user_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM regenerate_sessions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_for_user(pool: &PgPool, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM regenerate_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_active(pool: &PgPool, now: Timestamp) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM regenerate_sessions WHERE expires_at > $1")
                .bind(now)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }
}
