//! Log-stream handlers: open, close, write, tail, info.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tailgate_core::{AccountId, GatewayError, LogLine, StreamInfo};
use tracing::{info, instrument};

use crate::{error::ApiError, state::AppState};

/// Query parameters shared by the stream operations.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Account the stream belongs to.
    #[serde(rename = "accountID")]
    pub account_id: Option<String>,
    /// Stream key within the account namespace.
    pub key: Option<String>,
}

impl StreamParams {
    /// Resolves the account-scoped backend key.
    fn scoped_key(&self) -> Result<String, ApiError> {
        let account_id = self
            .account_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(AccountId::from)
            .ok_or_else(|| {
                GatewayError::BadRequest("missing accountID query parameter".into())
            })?;
        let key = self
            .key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GatewayError::BadRequest("missing key query parameter".into()))?;
        Ok(account_id.scoped_key(key))
    }
}

/// Opens a stream.
#[instrument(name = "open_stream", skip(state, params))]
pub async fn open_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<StatusCode, ApiError> {
    let key = params.scoped_key()?;
    state.streams.create(&key).await?;
    info!(key = %key, "stream opened");
    Ok(StatusCode::NO_CONTENT)
}

/// Closes a stream and removes blobs stored under its key.
#[instrument(name = "close_stream", skip(state, params))]
pub async fn close_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<StatusCode, ApiError> {
    let key = params.scoped_key()?;
    state.streams.delete(&key).await?;

    let removed = state
        .store
        .delete_prefix(&format!("{key}/"), state.config.cache_scan_batch_size)
        .await?;
    info!(key = %key, removed_blobs = removed, "stream closed");
    Ok(StatusCode::NO_CONTENT)
}

/// Appends lines to an open stream.
#[instrument(name = "write_stream", skip(state, params, lines), fields(line_count = lines.len()))]
pub async fn write_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
    Json(lines): Json<Vec<LogLine>>,
) -> Result<StatusCode, ApiError> {
    let key = params.scoped_key()?;
    state.streams.write(&key, lines).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the lines currently held for a stream.
#[instrument(name = "tail_stream", skip(state, params))]
pub async fn tail_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Json<Vec<LogLine>>, ApiError> {
    let key = params.scoped_key()?;
    let lines = state.streams.tail(&key).await?;
    Ok(Json(lines))
}

/// Returns aggregate stream-backend counters.
#[instrument(name = "stream_info", skip(state))]
pub async fn stream_info(State(state): State<AppState>) -> Result<Json<StreamInfo>, ApiError> {
    Ok(Json(state.streams.info().await?))
}
