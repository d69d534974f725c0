//! Domain logic for thumbforge: credit entitlements, regenerate sessions,
//! prompt assembly, reference collection, and generation orchestration.
//!
//! Nothing in this crate talks to a database or an HTTP endpoint directly.
//! Persistence and external providers are reached through the traits in
//! [`store`] and [`provider`], which the `db` and `providers` crates implement.

pub mod answers;
pub mod entitlement;
pub mod error;
pub mod history;
pub mod memory;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod references;
pub mod regenerate;
pub mod scratch;
pub mod store;
pub mod types;
