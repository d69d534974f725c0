//! HTTP-level tests for the admin endpoints.

mod common;

use axum::http::StatusCode;
use common::{
    admin_token, body_json, build_test_app, delete_auth, get_auth, post_auth, post_json_auth,
    token_for, TestApp,
};
use serde_json::json;

/// Sign in as `user_id` once so a record exists.
async fn visit(test: &TestApp, user_id: &str) -> String {
    let token = token_for(user_id, &format!("{user_id}@example.com"));
    let response = get_auth(test.app(), "/api/v1/credits", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    token
}

async fn adjust(test: &TestApp, user_id: &str, thumbnails: i32, regenerates: i32) -> serde_json::Value {
    let response = post_json_auth(
        test.app(),
        &format!("/api/v1/admin/users/{user_id}/adjust"),
        json!({ "thumbnails": thumbnails, "regenerates": regenerates }),
        &admin_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Test: non-admins are forbidden
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_admin_is_forbidden() {
    let test = build_test_app();
    let token = visit(&test, "user-1").await;

    let response = get_auth(test.app(), "/api/v1/admin/users", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");
}

// ---------------------------------------------------------------------------
// Test: adjust clamps at zero
// ---------------------------------------------------------------------------

#[tokio::test]
async fn adjust_clamps_at_zero() {
    let test = build_test_app();
    visit(&test, "user-1").await;

    let json = adjust(&test, "user-1", 3, 2).await;
    assert_eq!(json["data"]["thumbnails_remaining"], 3);
    assert_eq!(json["data"]["regenerates_remaining"], 2);

    let json = adjust(&test, "user-1", -1000, 0).await;
    assert_eq!(json["data"]["thumbnails_remaining"], 0);
    assert_eq!(json["data"]["regenerates_remaining"], 2);
}

#[tokio::test]
async fn adjusting_unknown_user_is_not_found() {
    let test = build_test_app();

    let response = post_json_auth(
        test.app(),
        "/api/v1/admin/users/nobody/adjust",
        json!({ "thumbnails": 1 }),
        &admin_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: block and delete, and their admin protection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn block_zeroes_balances() {
    let test = build_test_app();
    visit(&test, "user-1").await;
    adjust(&test, "user-1", 5, 5).await;

    let response = post_auth(test.app(), "/api/v1/admin/users/user-1/block", &admin_token()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["thumbnails_remaining"], 0);
    assert_eq!(json["data"]["regenerates_remaining"], 0);
}

#[tokio::test]
async fn admins_cannot_be_blocked_or_deleted() {
    let test = build_test_app();
    get_auth(test.app(), "/api/v1/credits", &admin_token()).await;

    let response = post_auth(test.app(), "/api/v1/admin/users/admin-1/block", &admin_token()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = delete_auth(test.app(), "/api/v1/admin/users/admin-1", &admin_token()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_removes_user_and_history() {
    let test = build_test_app();
    let token = visit(&test, "user-1").await;
    let response = post_json_auth(
        test.app(),
        "/api/v1/thumbnails/generate",
        json!({ "answers": { "topic": "Houseplant care" } }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = delete_auth(test.app(), "/api/v1/admin/users/user-1", &admin_token()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let json = body_json(get_auth(test.app(), "/api/v1/admin/users", &admin_token()).await).await;
    assert!(json["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|u| u["user_id"] != "user-1"));

    let json = body_json(get_auth(test.app(), "/api/v1/admin/stats", &admin_token()).await).await;
    assert_eq!(json["data"]["total_thumbnails_generated"], 0);
}

// ---------------------------------------------------------------------------
// Test: free preview reset
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reset_free_preview_reenables_generation() {
    let test = build_test_app();
    let token = visit(&test, "user-1").await;
    post_auth(test.app(), "/api/v1/credits/free-preview/consume", &token).await;

    let response = post_auth(
        test.app(),
        "/api/v1/admin/users/user-1/reset-free-preview",
        &admin_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["has_used_free_preview"], false);

    let json = body_json(get_auth(test.app(), "/api/v1/credits/free-preview", &token).await).await;
    assert_eq!(json["data"]["can_generate"], true);
}

// ---------------------------------------------------------------------------
// Test: stats aggregate across users
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stats_aggregate_users_and_sessions() {
    let test = build_test_app();
    let token = visit(&test, "user-1").await;
    visit(&test, "user-2").await;
    adjust(&test, "user-1", 4, 1).await;
    adjust(&test, "user-2", 2, 0).await;
    get_auth(test.app(), "/api/v1/credits", &admin_token()).await;

    let response = post_json_auth(
        test.app(),
        "/api/v1/thumbnails/generate",
        json!({ "answers": { "topic": "Houseplant care" } }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    post_json_auth(
        test.app(),
        "/api/v1/regenerate-sessions",
        json!({ "topic": "Houseplant care" }),
        &token,
    )
    .await;

    let response = get_auth(test.app(), "/api/v1/admin/stats", &admin_token()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await["data"].clone();
    assert_eq!(stats["total_users"], 3);
    assert_eq!(stats["admin_users"], 1);
    assert_eq!(stats["free_previews_used"], 1);
    assert_eq!(stats["thumbnails_outstanding"], 6);
    assert_eq!(stats["regenerates_outstanding"], 1);
    assert_eq!(stats["total_thumbnails_generated"], 1);
    assert_eq!(stats["active_regenerate_sessions"], 1);
}
