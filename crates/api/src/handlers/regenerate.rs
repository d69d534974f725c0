//! Handlers for the `/regenerate-sessions` resource.
//!
//! A session remembers what the user was working on for one hour so a later
//! "regenerate" can re-run it against a regenerate credit.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use thumbforge_core::history::GenerationResult;
use thumbforge_core::regenerate::{RegenerateSession, SessionTarget};
use thumbforge_core::types::RecordId;

use super::upload::{decode_optional, ImageUpload};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body for `POST /regenerate-sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub topic: String,
    pub original_thumbnail_id: Option<RecordId>,
    pub user_image: Option<ImageUpload>,
}

/// Query for `DELETE /regenerate-sessions`.
#[derive(Debug, Deserialize)]
pub struct DeleteSessionQuery {
    pub id: Option<RecordId>,
    #[serde(default)]
    pub all: bool,
}

/// Session metadata. Image bytes are never echoed back.
#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: RegenerateSession,
    pub has_user_image: bool,
}

impl From<RegenerateSession> for SessionView {
    fn from(session: RegenerateSession) -> Self {
        Self {
            has_user_image: session.user_image.is_some(),
            session,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteSessionsResponse {
    pub deleted: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/regenerate-sessions
///
/// `original_thumbnail_id`, when given, must be one of the caller's thumbnails.
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateSessionRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<SessionView>>)> {
    let user_image = decode_optional(input.user_image)?;
    if let Some(original) = input.original_thumbnail_id {
        state.history.get(&user.user_id, original).await?;
    }

    let session = state
        .sessions
        .create(
            &user.user_id,
            &input.topic,
            input.original_thumbnail_id,
            user_image,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(session.into()))))
}

/// GET /api/v1/regenerate-sessions/active
///
/// `data` is `null` when the caller has no unexpired session.
pub async fn get_active(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Option<SessionView>>>> {
    let session = state.sessions.get_active(&user.user_id).await?;
    Ok(Json(DataResponse::new(session.map(SessionView::from))))
}

/// DELETE /api/v1/regenerate-sessions?id={id}&all={bool}
///
/// Without an `id`, or with `all=true`, every session of the caller is
/// removed. An `id` matches any session the caller owns, expired or not;
/// an unknown or foreign id is a no-op so deletes stay idempotent.
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<DeleteSessionQuery>,
) -> AppResult<Json<DataResponse<DeleteSessionsResponse>>> {
    let deleted = match params.id.filter(|_| !params.all) {
        None => {
            state
                .sessions
                .delete(SessionTarget::AllForUser(user.user_id.clone()))
                .await?
        }
        Some(id) => {
            state
                .sessions
                .delete(SessionTarget::ById {
                    id,
                    user_id: user.user_id.clone(),
                })
                .await?
        }
    };
    Ok(Json(DataResponse::new(DeleteSessionsResponse { deleted })))
}

/// POST /api/v1/regenerate-sessions/active/generate
///
/// Re-run the active session against a regenerate credit. The session is
/// consumed on success.
pub async fn generate(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<(StatusCode, Json<DataResponse<GenerationResult>>)> {
    state.ledger.get_or_create(&user.user_id, &user.email).await?;
    let result = state
        .orchestrator
        .generate_from_session(&user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(result))))
}
