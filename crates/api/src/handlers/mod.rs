//! Request handlers.
//!
//! Each submodule serves one resource. Handlers resolve the caller's
//! entitlement record first so the admin flag is always current, then
//! delegate to the core services in [`AppState`](crate::state::AppState).

pub mod admin;
pub mod credits;
pub mod internal;
pub mod regenerate;
pub mod thumbnails;
pub mod upload;
