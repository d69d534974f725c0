//! Route definitions for the `/regenerate-sessions` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::regenerate;
use crate::state::AppState;

/// Routes mounted at `/regenerate-sessions`.
///
/// ```text
/// POST   /                        -> create
/// DELETE /?id=&all=               -> delete
/// GET    /active                  -> get_active
/// POST   /active/generate         -> generate
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(regenerate::create).delete(regenerate::delete))
        .route("/active", get(regenerate::get_active))
        .route("/active/generate", post(regenerate::generate))
}
