//! Archive-link handler behind the dedup gate.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use tailgate_core::{AccountId, ArchiveJob, RequestFingerprint};
use tracing::{info, instrument};

use crate::{error::ApiError, state::AppState};

/// Query parameters for the archive-link operation.
#[derive(Debug, Deserialize)]
pub struct ArchiveParams {
    /// Account the archive is scoped to.
    #[serde(rename = "accountID")]
    pub account_id: String,
    /// Key prefix the archive covers.
    pub prefix: String,
}

/// Enqueues archive generation for the prefix.
///
/// Only the single claimant of the dedup entry reaches this handler; the
/// fingerprint it claimed arrives through the request extensions. The
/// response is always a processing indication, the worker publishes the
/// link into the cache once the store resolves it.
#[instrument(name = "request_archive", skip(state, fingerprint), fields(account_id = %params.account_id, prefix = %params.prefix))]
pub async fn request_archive(
    State(state): State<AppState>,
    Extension(fingerprint): Extension<RequestFingerprint>,
    Query(params): Query<ArchiveParams>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let account_id = AccountId::from(params.account_id);
    let prefix = params.prefix.trim().to_string();

    state.queue.enqueue(ArchiveJob { account_id, prefix, fingerprint }).await?;

    info!("archive job enqueued");
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "processing" }))))
}
