pub mod admin;
pub mod credits;
pub mod health;
pub mod internal;
pub mod regenerate;
pub mod thumbnails;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /credits                              get caller's balances
/// /credits/free-preview                 free-preview availability
/// /credits/free-preview/consume         spend the free preview (POST)
/// /credits/download                     full-resolution download check
/// /credits/can-consume?kind=            credit availability
/// /credits/consume                      spend one credit (POST)
///
/// /internal/credits/grant               payment-confirmed credit grant (POST, x-internal-token)
///
/// /thumbnails                           history list
/// /thumbnails/generate                  generate one (POST)
/// /thumbnails/variations                generate a batch (POST)
/// /thumbnails/{id}                      get, delete
///
/// /regenerate-sessions                  create (POST), delete (DELETE ?id=&all=)
/// /regenerate-sessions/active           active session
/// /regenerate-sessions/active/generate  regenerate from it (POST)
///
/// /admin/users                          list (admin only)
/// /admin/users/{id}                     delete
/// /admin/users/{id}/block               zero balances (POST)
/// /admin/users/{id}/adjust              signed deltas (POST)
/// /admin/users/{id}/reset-free-preview  re-enable free preview (POST)
/// /admin/stats                          aggregate counts
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/credits", credits::router())
        .nest("/internal", internal::router())
        .nest("/thumbnails", thumbnails::router())
        .nest("/regenerate-sessions", regenerate::router())
        .nest("/admin", admin::router())
}
