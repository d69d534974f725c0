//! Identity token handling.
//!
//! Tokens are minted by the external identity service; this crate only
//! verifies them.

pub mod jwt;
