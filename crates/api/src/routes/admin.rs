//! Route definitions for the `/admin` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// All routes require an admin email (enforced by handler extractors).
///
/// ```text
/// GET    /users                          -> list_users
/// DELETE /users/{id}                     -> delete_user
/// POST   /users/{id}/block               -> block_user
/// POST   /users/{id}/adjust              -> adjust
/// POST   /users/{id}/reset-free-preview  -> reset_free_preview
/// GET    /stats                          -> stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", delete(admin::delete_user))
        .route("/users/{id}/block", post(admin::block_user))
        .route("/users/{id}/adjust", post(admin::adjust))
        .route(
            "/users/{id}/reset-free-preview",
            post(admin::reset_free_preview),
        )
        .route("/stats", get(admin::stats))
}
