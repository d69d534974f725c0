//! Route definitions for the `/thumbnails` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::thumbnails;
use crate::state::AppState;

/// Routes mounted at `/thumbnails`.
///
/// ```text
/// GET    /                        -> list
/// POST   /generate                -> generate
/// POST   /variations              -> generate_variations
/// GET    /{id}                    -> get_by_id
/// DELETE /{id}                    -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(thumbnails::list))
        .route("/generate", post(thumbnails::generate))
        .route("/variations", post(thumbnails::generate_variations))
        .route(
            "/{id}",
            get(thumbnails::get_by_id).delete(thumbnails::delete),
        )
}
