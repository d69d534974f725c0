//! Repository for the `thumbnails` table.

use sqlx::PgPool;
use thumbforge_core::history::NewGenerationResult;
use thumbforge_core::types::RecordId;

use crate::models::thumbnail::Thumbnail;

const COLUMNS: &str = "\
    id, user_id, topic, prompt, image_url, ctr_score, ctr_analysis, \
    created_at, updated_at";

pub struct ThumbnailRepo;

impl ThumbnailRepo {
    pub async fn create(pool: &PgPool, input: &NewGenerationResult) -> Result<Thumbnail, sqlx::Error> {
        let query = format!(
            "INSERT INTO thumbnails (id, user_id, topic, prompt, image_url) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Thumbnail>(&query)
            .bind(uuid::Uuid::now_v7())
            .bind(&input.user_id)
            .bind(&input.topic)
            .bind(&input.prompt)
            .bind(&input.image_url)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: RecordId) -> Result<Option<Thumbnail>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM thumbnails WHERE id = $1");
        sqlx::query_as::<_, Thumbnail>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// A user's thumbnails, newest first.
    pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<Thumbnail>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM thumbnails \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Thumbnail>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: RecordId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM thumbnails WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_for_user(pool: &PgPool, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM thumbnails WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM thumbnails")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}
