//! Request extractors that gate handlers.
//!
//! - [`auth::AuthUser`] verifies the identity token.
//! - [`rbac::RequireAdmin`] additionally requires an allow-listed email.
//! - [`internal::InternalCaller`] authenticates service-to-service calls.

pub mod auth;
pub mod internal;
pub mod rbac;
