//! External log-analytics relay handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tailgate_core::{AccountId, GatewayError, LogLine};
use tracing::instrument;

use crate::{error::ApiError, state::AppState};

/// Query parameters for the analytics relay.
#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    /// Account the lines belong to.
    #[serde(rename = "accountID")]
    pub account_id: Option<String>,
    /// Stream key the lines came from.
    pub key: Option<String>,
}

impl AnalyticsParams {
    fn scoped_key(&self) -> Result<String, ApiError> {
        let account_id = self
            .account_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(AccountId::from)
            .ok_or_else(|| GatewayError::BadRequest("missing accountID query parameter".into()))?;
        let key = self
            .key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GatewayError::BadRequest("missing key query parameter".into()))?;
        Ok(account_id.scoped_key(key))
    }
}

/// Forwards log lines to the external analytics sink unchanged.
#[instrument(name = "forward_analytics", skip(state, params, lines), fields(line_count = lines.len()))]
pub async fn forward_analytics(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsParams>,
    Json(lines): Json<Vec<LogLine>>,
) -> Result<StatusCode, ApiError> {
    state.sink.write(&params.scoped_key()?, lines).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reports whether the analytics sink is reachable.
#[instrument(name = "analytics_ping", skip_all)]
pub async fn analytics_ping(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.sink.ping().await?;
    Ok(StatusCode::NO_CONTENT)
}
