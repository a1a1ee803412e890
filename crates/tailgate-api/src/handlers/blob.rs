//! Blob handlers: direct transfer, existence, presigned links.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tailgate_core::{AccountId, GatewayError, SignedLink};
use tracing::instrument;

use crate::{error::ApiError, state::AppState};

/// Query parameters shared by the blob operations.
#[derive(Debug, Deserialize)]
pub struct BlobParams {
    /// Account the blob belongs to.
    #[serde(rename = "accountID")]
    pub account_id: Option<String>,
    /// Blob key within the account namespace.
    pub key: Option<String>,
}

impl BlobParams {
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

/// Stores the request body under the blob key.
#[instrument(name = "upload_blob", skip(state, params, body), fields(size = body.len()))]
pub async fn upload_blob(
    State(state): State<AppState>,
    Query(params): Query<BlobParams>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let key = params.scoped_key()?;
    state.store.upload(&key, body).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the blob stored under the key.
#[instrument(name = "download_blob", skip(state, params))]
pub async fn download_blob(
    State(state): State<AppState>,
    Query(params): Query<BlobParams>,
) -> Result<Bytes, ApiError> {
    let key = params.scoped_key()?;
    Ok(state.store.download(&key).await?)
}

/// Deletes the blob stored under the key.
#[instrument(name = "delete_blob", skip(state, params))]
pub async fn delete_blob(
    State(state): State<AppState>,
    Query(params): Query<BlobParams>,
) -> Result<StatusCode, ApiError> {
    let key = params.scoped_key()?;
    state.store.delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reports whether a blob exists under the key.
#[instrument(name = "blob_exists", skip(state, params))]
pub async fn blob_exists(
    State(state): State<AppState>,
    Query(params): Query<BlobParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let key = params.scoped_key()?;
    let exists = state.store.exists(&key).await?;
    Ok(Json(serde_json::json!({ "exists": exists })))
}

/// Returns a presigned upload link for the key.
#[instrument(name = "upload_link", skip(state, params))]
pub async fn upload_link(
    State(state): State<AppState>,
    Query(params): Query<BlobParams>,
) -> Result<Json<SignedLink>, ApiError> {
    let key = params.scoped_key()?;
    let link = state.store.upload_link(&key, state.config.dedup_ttl()).await?;
    Ok(Json(link))
}

/// Returns a presigned download link for the key.
#[instrument(name = "download_link", skip(state, params))]
pub async fn download_link(
    State(state): State<AppState>,
    Query(params): Query<BlobParams>,
) -> Result<Json<SignedLink>, ApiError> {
    let key = params.scoped_key()?;
    let link = state.store.download_link(&key, state.config.dedup_ttl()).await?;
    Ok(Json(link))
}
