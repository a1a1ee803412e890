//! Token issuance handler.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tailgate_core::{AccountId, GatewayError};
use tracing::{info, instrument};

use crate::{error::ApiError, state::AppState};

/// Query parameters for token issuance.
#[derive(Debug, Deserialize)]
pub struct TokenParams {
    /// Account the token will be scoped to.
    #[serde(rename = "accountID")]
    pub account_id: Option<String>,
}

/// Response carrying a freshly issued token.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The encoded token for subsequent requests.
    pub token: String,
    /// Account the token is scoped to.
    pub account_id: String,
    /// Issuance timestamp.
    pub issued_at: DateTime<Utc>,
}

/// Issues an account-scoped token.
///
/// The issuance gate has already verified the caller holds the global
/// secret; this handler only signs.
#[instrument(name = "issue_token", skip(state))]
pub async fn issue_token(
    State(state): State<AppState>,
    Query(params): Query<TokenParams>,
) -> Result<Json<TokenResponse>, ApiError> {
    let account_id = params
        .account_id
        .filter(|id| !id.trim().is_empty())
        .map(AccountId::from)
        .ok_or_else(|| GatewayError::BadRequest("missing accountID query parameter".into()))?;

    let token = state.codec.issue(&account_id, state.clock.as_ref());
    info!(account_id = %account_id, "issued account token");

    Ok(Json(TokenResponse {
        token: token.encode(),
        account_id: account_id.to_string(),
        issued_at: token.issued_at,
    }))
}
