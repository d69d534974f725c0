//! Route definitions for the `/credits` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::credits;
use crate::state::AppState;

/// Routes mounted at `/credits`.
///
/// ```text
/// GET    /                        -> get_credits
/// GET    /free-preview            -> check_free_preview
/// POST   /free-preview/consume    -> consume_free_preview
/// GET    /download                -> check_download
/// GET    /can-consume             -> can_consume
/// POST   /consume                 -> consume
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(credits::get_credits))
        .route("/free-preview", get(credits::check_free_preview))
        .route("/free-preview/consume", post(credits::consume_free_preview))
        .route("/download", get(credits::check_download))
        .route("/can-consume", get(credits::can_consume))
        .route("/consume", post(credits::consume))
}
