//! Handlers for the `/admin` resource (entitlement management).
//!
//! All handlers require an allow-listed email via [`RequireAdmin`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use thumbforge_core::entitlement::AdminStats;
use thumbforge_core::types::UserId;

use super::credits::CreditSummary;
use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body for `POST /admin/users/{id}/adjust`. Deltas may be negative;
/// balances never go below zero.
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    #[serde(default)]
    pub thumbnails: i32,
    #[serde(default)]
    pub regenerates: i32,
}

/// GET /api/v1/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<CreditSummary>>>> {
    let records = state.ledger.list_users().await?;
    Ok(Json(DataResponse::new(
        records.into_iter().map(CreditSummary::from).collect(),
    )))
}

/// GET /api/v1/admin/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<AdminStats>>> {
    let records = state.ledger.list_users().await?;
    let generated = state.history.count().await?;
    let active_sessions = state.sessions.count_active().await?;
    Ok(Json(DataResponse::new(AdminStats::from_records(
        &records,
        generated,
        active_sessions,
    ))))
}

/// POST /api/v1/admin/users/{id}/block
///
/// Zero both balances. 403 when the target is an admin.
pub async fn block_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<DataResponse<CreditSummary>>> {
    let record = state.ledger.block(&user_id).await?;
    tracing::info!(admin = %admin.user_id, target = %user_id, "User blocked");
    Ok(Json(DataResponse::new(record.into())))
}

/// DELETE /api/v1/admin/users/{id}
///
/// Remove the user's thumbnails and entitlement record. 403 when the target
/// is an admin.
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<UserId>,
) -> AppResult<StatusCode> {
    state.ledger.delete_user(&user_id).await?;
    tracing::info!(admin = %admin.user_id, target = %user_id, "User deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/users/{id}/adjust
pub async fn adjust(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<UserId>,
    Json(input): Json<AdjustRequest>,
) -> AppResult<Json<DataResponse<CreditSummary>>> {
    let record = state
        .ledger
        .adjust(&user_id, input.thumbnails, input.regenerates)
        .await?;
    tracing::info!(admin = %admin.user_id, target = %user_id, "Balances adjusted by admin");
    Ok(Json(DataResponse::new(record.into())))
}

/// POST /api/v1/admin/users/{id}/reset-free-preview
pub async fn reset_free_preview(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<DataResponse<CreditSummary>>> {
    let record = state.ledger.reset_free_preview(&user_id).await?;
    Ok(Json(DataResponse::new(record.into())))
}
