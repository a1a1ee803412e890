//! Deduplication gate for the archive-link route.
//!
//! Runs after the validators, so only well-formed requests ever reach the
//! cache. For each request it computes the fingerprint and performs the
//! atomic claim: a live cached result is served immediately, an in-flight
//! claim short-circuits with a processing indication, and the single winning
//! claimant proceeds into the handler.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tailgate_core::{AccountId, BeginOutcome, GatewayError, RequestFingerprint, SignedLink};
use tracing::{debug, error};

use crate::{error::ApiError, middleware::auth::query_map, state::AppState};

/// Body returned while the archive computation is in flight.
fn processing() -> Response {
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "processing" }))).into_response()
}

/// Body returned when a cached result is served.
fn ready(link: SignedLink) -> Response {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ready", "link": link })))
        .into_response()
}

/// Dedup gate.
///
/// On a claimed computation the fingerprint is attached to the request
/// extensions so the handler can enqueue the job against it; a handler
/// failure (status >= 400) releases the claim by marking the entry `Failed`.
pub async fn dedup_gate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let params = query_map(&req)?;

    // Both validated upstream; absence here is a route-construction bug.
    let account_id = params
        .get("accountID")
        .map(|id| AccountId::from(id.as_str()))
        .ok_or_else(|| GatewayError::BadRequest("missing required query parameter: accountID".into()))?;
    let prefix = params
        .get("prefix")
        .ok_or_else(|| GatewayError::BadRequest("missing required query parameter: prefix".into()))?;

    let fingerprint = RequestFingerprint::archive(&account_id, prefix);

    match state.cache.begin(&fingerprint, state.config.dedup_ttl()).await? {
        BeginOutcome::Ready(link) => {
            debug!(%fingerprint, "serving cached archive link");
            Ok(ready(link))
        },
        BeginOutcome::InFlight => {
            debug!(%fingerprint, "archive computation already in flight");
            Ok(processing())
        },
        BeginOutcome::Claimed => {
            debug!(%fingerprint, "claimed archive computation");
            req.extensions_mut().insert(fingerprint.clone());

            let response = next.run(req).await;

            if response.status().is_client_error() || response.status().is_server_error() {
                if let Err(e) = state.cache.fail(&fingerprint).await {
                    error!(%fingerprint, error = %e, "failed to release dedup claim");
                }
            }

            Ok(response)
        },
    }
}
