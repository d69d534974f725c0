//! Short-lived "regenerate" sessions that let a user retry a previous
//! generation without answering the questions again.
//!
//! Expiry is data-level: a session is active while `expires_at > now` at read
//! time. Expired rows are left in place until deleted by id or by user.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::answers::MAX_TOPIC_LENGTH;
use crate::error::CoreError;
use crate::store::SessionStore;
use crate::types::{ImagePayload, RecordId, Timestamp, UserId};

/// Fixed lifetime of a regenerate session.
pub const SESSION_TTL_MINUTES: i64 = 60;

/// A stored regenerate session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegenerateSession {
    pub id: RecordId,
    pub user_id: UserId,
    pub topic: String,
    /// Lookup-only reference to the result being regenerated.
    pub original_thumbnail_id: Option<RecordId>,
    #[serde(skip)]
    pub user_image: Option<ImagePayload>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl RegenerateSession {
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }
}

/// DTO for inserting a new session.
#[derive(Debug, Clone)]
pub struct NewRegenerateSession {
    pub user_id: UserId,
    pub topic: String,
    pub original_thumbnail_id: Option<RecordId>,
    pub user_image: Option<ImagePayload>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

/// Which sessions a delete call targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTarget {
    /// One session, matched only if `user_id` owns it.
    ById { id: RecordId, user_id: UserId },
    AllForUser(UserId),
}

/// Service over a [`SessionStore`].
pub struct RegenerateSessions {
    store: Arc<dyn SessionStore>,
}

impl RegenerateSessions {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Create a session that expires one hour from now.
    pub async fn create(
        &self,
        user_id: &str,
        topic: &str,
        original_thumbnail_id: Option<RecordId>,
        user_image: Option<ImagePayload>,
    ) -> Result<RegenerateSession, CoreError> {
        let topic = topic.trim();
        if user_id.trim().is_empty() {
            return Err(CoreError::Validation("user id must not be empty".to_string()));
        }
        if topic.is_empty() {
            return Err(CoreError::Validation("topic must not be empty".to_string()));
        }
        if topic.chars().count() > MAX_TOPIC_LENGTH {
            return Err(CoreError::Validation(format!(
                "topic exceeds maximum length of {MAX_TOPIC_LENGTH} characters"
            )));
        }

        let now = Utc::now();
        let session = self
            .store
            .insert(NewRegenerateSession {
                user_id: user_id.to_string(),
                topic: topic.to_string(),
                original_thumbnail_id,
                user_image,
                created_at: now,
                expires_at: now + Duration::minutes(SESSION_TTL_MINUTES),
            })
            .await?;
        tracing::info!(user_id, session_id = %session.id, "Regenerate session created");
        Ok(session)
    }

    /// The user's most recent non-expired session, if any.
    pub async fn get_active(&self, user_id: &str) -> Result<Option<RegenerateSession>, CoreError> {
        self.store.find_active(user_id, Utc::now()).await
    }

    /// Delete by id or by user. Deleting something already gone is a no-op.
    pub async fn delete(&self, target: SessionTarget) -> Result<u64, CoreError> {
        let removed = match &target {
            SessionTarget::ById { id, user_id } => {
                u64::from(self.store.delete_owned(*id, user_id).await?)
            }
            SessionTarget::AllForUser(user_id) => self.store.delete_for_user(user_id).await?,
        };
        tracing::debug!(?target, removed, "Regenerate sessions deleted");
        Ok(removed)
    }

    pub async fn count_active(&self) -> Result<u64, CoreError> {
        self.store.count_active(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::memory::MemorySessionStore;

    fn sessions() -> (Arc<MemorySessionStore>, RegenerateSessions) {
        let store = Arc::new(MemorySessionStore::new());
        (store.clone(), RegenerateSessions::new(store))
    }

    #[tokio::test]
    async fn created_session_expires_after_one_hour() {
        let (_, sessions) = sessions();
        let session = sessions.create("u1", "sourdough basics", None, None).await.unwrap();
        assert_eq!(
            session.expires_at - session.created_at,
            Duration::minutes(SESSION_TTL_MINUTES)
        );
        assert_eq!(sessions.get_active("u1").await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn blank_topic_is_rejected() {
        let (_, sessions) = sessions();
        assert_matches!(
            sessions.create("u1", "   ", None, None).await,
            Err(CoreError::Validation(_))
        );
    }

    #[tokio::test]
    async fn expired_session_is_never_active() {
        let (store, sessions) = sessions();
        let now = Utc::now();
        store
            .insert(NewRegenerateSession {
                user_id: "u1".to_string(),
                topic: "old".to_string(),
                original_thumbnail_id: None,
                user_image: None,
                created_at: now - Duration::hours(1),
                expires_at: now - Duration::seconds(1),
            })
            .await
            .unwrap();

        assert_eq!(sessions.get_active("u1").await.unwrap(), None);
        // Expired rows stay until explicitly purged.
        assert_eq!(sessions.delete(SessionTarget::AllForUser("u1".into())).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn most_recent_session_wins() {
        let (_, sessions) = sessions();
        sessions.create("u1", "first", None, None).await.unwrap();
        let second = sessions
            .create(
                "u1",
                "second",
                Some(uuid::Uuid::new_v4()),
                Some(ImagePayload::new("image/png", vec![1, 2, 3])),
            )
            .await
            .unwrap();

        let active = sessions.get_active("u1").await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert_eq!(active.user_image.unwrap().data, vec![1, 2, 3]);
        assert_eq!(sessions.count_active().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn deleting_a_missing_session_is_a_noop() {
        let (_, sessions) = sessions();
        let by_id = |id| SessionTarget::ById {
            id,
            user_id: "u1".into(),
        };
        assert_eq!(sessions.delete(by_id(uuid::Uuid::new_v4())).await.unwrap(), 0);

        let session = sessions.create("u1", "topic", None, None).await.unwrap();
        assert_eq!(sessions.delete(by_id(session.id)).await.unwrap(), 1);
        assert_eq!(sessions.delete(by_id(session.id)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_by_id_reaches_older_and_expired_sessions() {
        let (store, sessions) = sessions();
        let now = Utc::now();
        let expired = store
            .insert(NewRegenerateSession {
                user_id: "u1".to_string(),
                topic: "stale".to_string(),
                original_thumbnail_id: None,
                user_image: None,
                created_at: now - Duration::hours(2),
                expires_at: now - Duration::hours(1),
            })
            .await
            .unwrap();
        let older = sessions.create("u1", "older", None, None).await.unwrap();
        let newer = sessions.create("u1", "newer", None, None).await.unwrap();

        for id in [expired.id, older.id] {
            let target = SessionTarget::ById {
                id,
                user_id: "u1".into(),
            };
            assert_eq!(sessions.delete(target).await.unwrap(), 1);
        }
        assert_eq!(sessions.get_active("u1").await.unwrap().map(|s| s.id), Some(newer.id));
        assert_eq!(sessions.count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_by_id_ignores_other_users_sessions() {
        let (_, sessions) = sessions();
        let theirs = sessions.create("u2", "theirs", None, None).await.unwrap();

        let target = SessionTarget::ById {
            id: theirs.id,
            user_id: "u1".into(),
        };
        assert_eq!(sessions.delete(target).await.unwrap(), 0);
        assert!(sessions.get_active("u2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sessions_are_per_user() {
        let (_, sessions) = sessions();
        sessions.create("u1", "mine", None, None).await.unwrap();
        assert_eq!(sessions.get_active("u2").await.unwrap(), None);
    }
}
