//! Row structs for the thumbforge tables.
//!
//! Each row converts into its core domain type; the core never sees sqlx.

pub mod entitlement;
pub mod regenerate_session;
pub mod thumbnail;
