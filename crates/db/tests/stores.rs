//! Store adapters against a real Postgres.
//!
//! Ignored by default; run with `cargo test -p thumbforge-db -- --ignored`
//! when `DATABASE_URL` points at a scratch database.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use thumbforge_core::entitlement::{AdminEmails, CreditKind, EntitlementLedger};
use thumbforge_core::history::NewGenerationResult;
use thumbforge_core::regenerate::NewRegenerateSession;
use thumbforge_core::store::{EntitlementStore, ResultStore, SessionStore};
use thumbforge_core::types::ImagePayload;
use thumbforge_db::stores::{PgEntitlementStore, PgResultStore, PgSessionStore};

fn ledger(pool: &PgPool) -> EntitlementLedger {
    EntitlementLedger::new(
        Arc::new(PgEntitlementStore::new(pool.clone())),
        Arc::new(PgResultStore::new(pool.clone())),
        Arc::new(AdminEmails::new(["boss@example.com"])),
    )
}

fn new_result(user_id: &str, topic: &str) -> NewGenerationResult {
    NewGenerationResult {
        user_id: user_id.to_string(),
        topic: topic.to_string(),
        prompt: "prompt".to_string(),
        image_url: "data:image/png;base64,AA==".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Test: health check and migrations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_health_check(pool: PgPool) {
    thumbforge_db::health_check(&pool).await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: entitlements
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_insert_if_absent_is_idempotent(pool: PgPool) {
    let store = PgEntitlementStore::new(pool);
    let first = store.insert_if_absent("u1", "u1@example.com", false).await.unwrap();
    store.apply_delta("u1", 3, 0).await.unwrap();
    let second = store.insert_if_absent("u1", "other@example.com", true).await.unwrap();

    assert_eq!(first.thumbnails_remaining, 0);
    assert_eq!(second.thumbnails_remaining, 3);
    assert_eq!(second.email, "u1@example.com");
    assert!(!second.is_admin);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_decrement_stops_at_zero(pool: PgPool) {
    let store = PgEntitlementStore::new(pool);
    store.insert_if_absent("u1", "u1@example.com", false).await.unwrap();
    store.apply_delta("u1", 1, 0).await.unwrap();

    let first = store.try_decrement("u1", CreditKind::Thumbnail).await.unwrap();
    assert_eq!(first.unwrap().thumbnails_remaining, 0);
    assert!(store.try_decrement("u1", CreditKind::Thumbnail).await.unwrap().is_none());
    assert!(store.try_decrement("u1", CreditKind::Regenerate).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_apply_delta_clamps_at_zero(pool: PgPool) {
    let store = PgEntitlementStore::new(pool);
    store.insert_if_absent("u1", "u1@example.com", false).await.unwrap();
    store.apply_delta("u1", 3, 2).await.unwrap();

    let record = store.apply_delta("u1", -1000, 0).await.unwrap().unwrap();
    assert_eq!(record.thumbnails_remaining, 0);
    assert_eq!(record.regenerates_remaining, 2);

    store.apply_delta("u1", i32::MAX, i32::MAX).await.unwrap();
    let record = store.apply_delta("u1", i32::MAX, 0).await.unwrap().unwrap();
    assert_eq!(record.thumbnails_remaining, i32::MAX);
    assert!(store.apply_delta("missing", 1, 1).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_free_preview_flips_once(pool: PgPool) {
    let store = PgEntitlementStore::new(pool);
    store.insert_if_absent("u1", "u1@example.com", false).await.unwrap();

    assert!(store.mark_free_preview_used("u1").await.unwrap().is_some());
    assert!(store.mark_free_preview_used("u1").await.unwrap().is_none());

    let reset = store.reset_free_preview("u1").await.unwrap().unwrap();
    assert!(!reset.has_used_free_preview);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_consume_succeeds_once(pool: PgPool) {
    let ledger = Arc::new(ledger(&pool));
    ledger.get_or_create("u1", "u1@example.com").await.unwrap();
    ledger.adjust("u1", 1, 0).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.consume(CreditKind::Thumbnail, "u1").await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().success {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(ledger.get("u1").await.unwrap().thumbnails_remaining, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_delete_user_removes_history(pool: PgPool) {
    let ledger = ledger(&pool);
    let results = PgResultStore::new(pool.clone());
    ledger.get_or_create("u1", "u1@example.com").await.unwrap();
    results.insert(new_result("u1", "one")).await.unwrap();
    results.insert(new_result("u2", "other")).await.unwrap();

    ledger.delete_user("u1").await.unwrap();

    assert!(ledger.get("u1").await.is_err());
    assert!(results.list_for_user("u1").await.unwrap().is_empty());
    assert_eq!(results.count().await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Test: regenerate sessions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_active_session_ignores_expired_rows(pool: PgPool) {
    let store = PgSessionStore::new(pool);
    let now = Utc::now();

    store
        .insert(NewRegenerateSession {
            user_id: "u1".into(),
            topic: "expired".into(),
            original_thumbnail_id: None,
            user_image: None,
            created_at: now,
            expires_at: now - Duration::seconds(1),
        })
        .await
        .unwrap();
    assert!(store.find_active("u1", now).await.unwrap().is_none());

    let live = store
        .insert(NewRegenerateSession {
            user_id: "u1".into(),
            topic: "live".into(),
            original_thumbnail_id: Some(uuid::Uuid::new_v4()),
            user_image: Some(ImagePayload::new("image/png", vec![1, 2, 3])),
            created_at: now - Duration::minutes(1),
            expires_at: now + Duration::minutes(59),
        })
        .await
        .unwrap();

    let active = store.find_active("u1", now).await.unwrap().unwrap();
    assert_eq!(active.id, live.id);
    assert_eq!(active.user_image.unwrap().data, vec![1, 2, 3]);
    assert_eq!(store.count_active(now).await.unwrap(), 1);

    assert!(!store.delete_owned(live.id, "u2").await.unwrap());
    assert!(store.delete_owned(live.id, "u1").await.unwrap());
    assert!(!store.delete_owned(live.id, "u1").await.unwrap());
    assert_eq!(store.delete_for_user("u1").await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Test: thumbnails
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_thumbnails_list_newest_first(pool: PgPool) {
    let store = PgResultStore::new(pool);
    let first = store.insert(new_result("u1", "first")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = store.insert(new_result("u1", "second")).await.unwrap();

    let listed = store.list_for_user("u1").await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
    assert_eq!(store.find(first.id).await.unwrap().unwrap().topic, "first");
}
