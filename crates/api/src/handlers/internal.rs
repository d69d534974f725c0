//! Service-to-service handlers. Not reachable with a user token.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use thumbforge_core::entitlement::{CreditGrant, CreditPackage};
use thumbforge_core::types::UserId;

use super::credits::CreditSummary;
use crate::error::{AppError, AppResult};
use crate::middleware::internal::InternalCaller;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body for `POST /internal/credits/grant`.
///
/// Either `package` or explicit amounts, not both.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub user_id: UserId,
    /// Creates the buyer's record if they have never signed in.
    pub email: Option<String>,
    pub package: Option<CreditPackage>,
    pub thumbnails: Option<i32>,
    pub regenerates: Option<i32>,
}

impl GrantRequest {
    fn grant(&self) -> AppResult<CreditGrant> {
        let explicit = self.thumbnails.is_some() || self.regenerates.is_some();
        match (self.package, explicit) {
            (Some(_), true) => Err(AppError::BadRequest(
                "Specify either a package or explicit amounts, not both".into(),
            )),
            (Some(package), false) => Ok(CreditGrant::from_package(package)),
            (None, true) => Ok(CreditGrant {
                thumbnails: self.thumbnails.unwrap_or(0),
                regenerates: self.regenerates.unwrap_or(0),
            }),
            (None, false) => Err(AppError::BadRequest(
                "A package or credit amounts are required".into(),
            )),
        }
    }
}

/// POST /api/v1/internal/credits/grant
///
/// Called by the payment service after it has verified a purchase.
pub async fn grant_credits(
    State(state): State<AppState>,
    _caller: InternalCaller,
    Json(input): Json<GrantRequest>,
) -> AppResult<Json<DataResponse<CreditSummary>>> {
    let grant = input.grant()?;
    let record = state
        .ledger
        .grant_credits(&input.user_id, input.email.as_deref(), grant)
        .await?;
    Ok(Json(DataResponse::new(record.into())))
}
