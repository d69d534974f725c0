//! Authentication for calls from the payment service.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use thumbforge_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// A caller that presented the shared internal token.
pub struct InternalCaller;

impl FromRequestParts<AppState> for InternalCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(format!(
                    "Missing {INTERNAL_TOKEN_HEADER} header"
                )))
            })?;

        if !tokens_match(presented.as_bytes(), state.config.internal_api_token.as_bytes()) {
            tracing::warn!("Rejected internal call with a bad token");
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid internal token".into(),
            )));
        }
        Ok(InternalCaller)
    }
}

/// Compare without short-circuiting on the first differing byte.
fn tokens_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
