//! Handlers for the `/credits` resource: the caller's own balances.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use thumbforge_core::entitlement::{
    Balance, ConsumeOutcome, CreditKind, Decision, DownloadCheck, EntitlementRecord,
    FreePreviewCheck,
};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// An entitlement record plus the balances as the user should see them.
#[derive(Debug, Serialize)]
pub struct CreditSummary {
    #[serde(flatten)]
    pub record: EntitlementRecord,
    pub thumbnails_available: Balance,
    pub regenerates_available: Balance,
}

impl From<EntitlementRecord> for CreditSummary {
    fn from(record: EntitlementRecord) -> Self {
        Self {
            thumbnails_available: record.thumbnails_display(),
            regenerates_available: record.regenerates_display(),
            record,
        }
    }
}

/// Query for `GET /credits/can-consume`.
#[derive(Debug, Deserialize)]
pub struct KindQuery {
    pub kind: CreditKind,
}

/// Body for `POST /credits/consume`.
#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    pub kind: CreditKind,
}

/// GET /api/v1/credits
///
/// Return the caller's record, creating it on first sight.
pub async fn get_credits(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<CreditSummary>>> {
    let record = state.ledger.get_or_create(&user.user_id, &user.email).await?;
    Ok(Json(DataResponse::new(record.into())))
}

/// GET /api/v1/credits/free-preview
pub async fn check_free_preview(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<FreePreviewCheck>>> {
    let check = state
        .ledger
        .check_free_preview(&user.user_id, &user.email)
        .await?;
    Ok(Json(DataResponse::new(check)))
}

/// POST /api/v1/credits/free-preview/consume
///
/// A second call for the same user returns `success: false`.
pub async fn consume_free_preview(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<ConsumeOutcome>>> {
    state.ledger.get_or_create(&user.user_id, &user.email).await?;
    let outcome = state.ledger.consume_free_preview(&user.user_id).await?;
    Ok(Json(DataResponse::new(outcome)))
}

/// GET /api/v1/credits/download
pub async fn check_download(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<DownloadCheck>>> {
    let check = state
        .ledger
        .check_download_allowed(&user.user_id, &user.email)
        .await?;
    Ok(Json(DataResponse::new(check)))
}

/// GET /api/v1/credits/can-consume?kind=thumbnail
pub async fn can_consume(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<KindQuery>,
) -> AppResult<Json<DataResponse<Decision>>> {
    state.ledger.get_or_create(&user.user_id, &user.email).await?;
    let decision = state.ledger.can_consume(params.kind, &user.user_id).await?;
    Ok(Json(DataResponse::new(decision)))
}

/// POST /api/v1/credits/consume
///
/// Spend one credit. An empty balance is reported as `success: false`,
/// not as an error.
pub async fn consume(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<ConsumeRequest>,
) -> AppResult<Json<DataResponse<ConsumeOutcome>>> {
    state.ledger.get_or_create(&user.user_id, &user.email).await?;
    let outcome = state.ledger.consume(input.kind, &user.user_id).await?;
    Ok(Json(DataResponse::new(outcome)))
}
