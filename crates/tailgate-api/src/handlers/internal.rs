//! Internal operations handler.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tailgate_core::GatewayError;
use tracing::{info, instrument};

use crate::{error::ApiError, state::AppState};

/// Query parameters for the internal purge operation.
#[derive(Debug, Deserialize)]
pub struct PurgeParams {
    /// Raw store prefix to purge. Not account-scoped: internal operators
    /// manage data across accounts.
    pub prefix: Option<String>,
}

/// Deletes every blob under the given prefix.
#[instrument(name = "purge_blobs", skip(state, params))]
pub async fn purge_blobs(
    State(state): State<AppState>,
    Query(params): Query<PurgeParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let prefix = params
        .prefix
        .as_deref()
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .ok_or_else(|| GatewayError::BadRequest("missing prefix query parameter".into()))?;

    let removed = state.store.delete_prefix(prefix, state.config.cache_scan_batch_size).await?;
    info!(prefix = %prefix, removed, "blobs purged");

    Ok(Json(serde_json::json!({ "removed": removed })))
}
