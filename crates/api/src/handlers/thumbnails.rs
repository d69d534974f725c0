//! Handlers for the `/thumbnails` resource: generation and history.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use thumbforge_core::answers::GenerationAnswers;
use thumbforge_core::history::GenerationResult;
use thumbforge_core::types::RecordId;

use super::upload::{decode_optional, ImageUpload};
use crate::error::{all_variations_failed, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body for `POST /thumbnails/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub answers: GenerationAnswers,
    pub user_image: Option<ImageUpload>,
}

/// Body for `POST /thumbnails/variations`.
#[derive(Debug, Deserialize)]
pub struct VariationsRequest {
    pub answers: GenerationAnswers,
    pub count: usize,
    pub user_image: Option<ImageUpload>,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// POST /api/v1/thumbnails/generate
///
/// Paid by the free preview if unused, otherwise by one thumbnail credit.
/// Returns 402 when neither is available.
pub async fn generate(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<GenerateRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<GenerationResult>>)> {
    let user_image = decode_optional(input.user_image)?;
    state.ledger.get_or_create(&user.user_id, &user.email).await?;

    let result = state
        .orchestrator
        .generate_one(&user.user_id, &input.answers, user_image.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(result))))
}

/// POST /api/v1/thumbnails/variations
///
/// Each variation is charged separately. The batch may come back shorter
/// than `count` when credits run out part way or individual attempts fail.
pub async fn generate_variations(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<VariationsRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Vec<GenerationResult>>>)> {
    let user_image = decode_optional(input.user_image)?;
    state.ledger.get_or_create(&user.user_id, &user.email).await?;

    let results = state
        .orchestrator
        .generate_variations(
            &user.user_id,
            &input.answers,
            input.count,
            user_image.as_ref(),
        )
        .await?;
    if results.is_empty() {
        return Err(all_variations_failed());
    }
    Ok((StatusCode::CREATED, Json(DataResponse::new(results))))
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// GET /api/v1/thumbnails
///
/// The caller's thumbnails, newest first.
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<GenerationResult>>>> {
    let results = state.history.list(&user.user_id).await?;
    Ok(Json(DataResponse::new(results)))
}

/// GET /api/v1/thumbnails/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<RecordId>,
) -> AppResult<Json<DataResponse<GenerationResult>>> {
    let result = state.history.get(&user.user_id, id).await?;
    Ok(Json(DataResponse::new(result)))
}

/// DELETE /api/v1/thumbnails/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<RecordId>,
) -> AppResult<StatusCode> {
    state.history.delete(&user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
