//! Root-cause analysis relay handler.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tailgate_core::{AccountId, AnalysisReport, GatewayError, LogLine};
use tracing::instrument;

use crate::{error::ApiError, state::AppState};

/// Query parameters for the analysis relay.
#[derive(Debug, Deserialize)]
pub struct RcaParams {
    /// Account the logs belong to.
    #[serde(rename = "accountID")]
    pub account_id: Option<String>,
    /// Stream key the lines came from.
    pub key: Option<String>,
}

/// Relays log lines to the analyzer collaborator.
///
/// The payload is forwarded unchanged; the gateway adds only the
/// account-scoped key. Entitlement was already checked by the auth gate.
#[instrument(name = "rca", skip(state, params, lines), fields(line_count = lines.len()))]
pub async fn rca(
    State(state): State<AppState>,
    Query(params): Query<RcaParams>,
    Json(lines): Json<Vec<LogLine>>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let account_id = params
        .account_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .map(AccountId::from)
        .ok_or_else(|| GatewayError::BadRequest("missing accountID query parameter".into()))?;
    let key = params
        .key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| GatewayError::BadRequest("missing key query parameter".into()))?;

    let report = state.analyzer.analyze(&account_id.scoped_key(key), &lines).await?;
    Ok(Json(report))
}
