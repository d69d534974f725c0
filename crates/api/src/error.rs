use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thumbforge_core::error::CoreError;

/// Message returned for every upstream generation failure. Provider detail
/// is logged, never returned.
const GENERATION_FAILED_MESSAGE: &str = "Thumbnail generation failed. Please try again.";

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `thumbforge_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let core = match self {
            AppError::BadRequest(msg) => {
                return error_body(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg);
            }
            AppError::Core(core) => core,
        };

        match core {
            CoreError::NotFound { entity, id } => error_body(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} with id {id} not found"),
            ),
            CoreError::Validation(msg) => {
                error_body(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
            }
            CoreError::Unauthorized(msg) => {
                error_body(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
            }
            CoreError::Forbidden(msg) => error_body(StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            CoreError::EntitlementDenied {
                reason,
                thumbnails_remaining,
                regenerates_remaining,
            } => {
                let body = json!({
                    "error": reason,
                    "code": "ENTITLEMENT_DENIED",
                    "thumbnails_remaining": thumbnails_remaining,
                    "regenerates_remaining": regenerates_remaining,
                });
                (StatusCode::PAYMENT_REQUIRED, axum::Json(body)).into_response()
            }
            CoreError::Generation(err) => {
                tracing::error!(error = %err, "Generation failed");
                error_body(
                    StatusCode::BAD_GATEWAY,
                    "GENERATION_FAILED",
                    GENERATION_FAILED_MESSAGE.to_string(),
                )
            }
            CoreError::Persistence(msg) => {
                tracing::error!(error = %msg, "Persistence error");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
            CoreError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal core error");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
        }
    }
}

fn error_body(status: StatusCode, code: &'static str, message: String) -> Response {
    let body = json!({
        "error": message,
        "code": code,
    });
    (status, axum::Json(body)).into_response()
}

/// Error returned when a variation batch produced nothing.
pub fn all_variations_failed() -> AppError {
    AppError::Core(CoreError::Generation(
        thumbforge_core::provider::GenerationError::NoOutputProduced,
    ))
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use thumbforge_core::entitlement::Balance;
    use thumbforge_core::provider::GenerationError;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn entitlement_denial_carries_balances() {
        let (status, body) = render(AppError::Core(CoreError::EntitlementDenied {
            reason: "No thumbnail credits remaining".into(),
            thumbnails_remaining: Balance::Finite(0),
            regenerates_remaining: Balance::Unlimited,
        }))
        .await;

        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], "ENTITLEMENT_DENIED");
        assert_eq!(body["thumbnails_remaining"], 0);
        assert_eq!(body["regenerates_remaining"], "unlimited");
    }

    #[tokio::test]
    async fn provider_detail_is_not_leaked() {
        let (status, body) = render(AppError::Core(CoreError::Generation(
            GenerationError::Provider("Gemini API error (500): secret stack trace".into()),
        )))
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "GENERATION_FAILED");
        assert_eq!(body["error"], GENERATION_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn persistence_errors_are_sanitized() {
        let (status, body) =
            render(AppError::Core(CoreError::Persistence("connection reset".into()))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_MESSAGE);
    }
}
