//! Route definitions for service-to-service calls.

use axum::routing::post;
use axum::Router;

use crate::handlers::internal;
use crate::state::AppState;

/// Routes mounted at `/internal`.
///
/// ```text
/// POST   /credits/grant           -> grant_credits
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/credits/grant", post(internal::grant_credits))
}
