//! Authentication gates.
//!
//! One polymorphic gate handles both account-scoped and internal routes,
//! parameterized by [`AuthPolicy`]; a separate issuance gate protects the
//! token endpoint with the global secret itself. On success the gate attaches
//! an `AuthScope` to the request extensions for downstream logging.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tailgate_core::{token::constant_time_eq, AccountId, AuthScope, GatewayError};
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Authorization strategy a route is mounted with.
///
/// Decided once at route construction; the gate itself never branches on
/// configuration.
#[derive(Debug, Clone, Copy)]
pub enum AuthPolicy {
    /// Token must match the `accountID` query parameter; optionally the
    /// account must also hold the named entitlement.
    AccountScoped {
        /// Feature the `Authorizer` collaborator is consulted for, if any.
        require_entitlement: Option<&'static str>,
    },
    /// Token must match `accountID`, and the account must appear in the
    /// configured internal allowlist.
    Internal,
}

#[derive(Debug, serde::Deserialize)]
struct AuthParams {
    #[serde(rename = "accountID")]
    account_id: Option<String>,
    token: Option<String>,
}

fn auth_params(req: &Request<Body>) -> Result<AuthParams, ApiError> {
    let Query(params) = Query::<AuthParams>::try_from_uri(req.uri())
        .map_err(|_| GatewayError::BadRequest("malformed query string".into()))?;
    Ok(params)
}

/// Account and internal authentication gate.
///
/// Validates the `token` query parameter against the `accountID` query
/// parameter, then applies the policy's entitlement rule. 401 for missing or
/// invalid tokens, 403 for entitlement denials.
pub async fn auth_gate(
    State((state, policy)): State<(AppState, AuthPolicy)>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let params = auth_params(&req)?;

    let account_id = params
        .account_id
        .filter(|id| !id.trim().is_empty())
        .map(AccountId::from)
        .ok_or_else(|| GatewayError::Unauthorized("missing accountID query parameter".into()))?;

    let token = params
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| GatewayError::Unauthorized("missing token query parameter".into()))?;

    state.codec.validate(&token, &account_id)?;

    let scope = match policy {
        AuthPolicy::AccountScoped { require_entitlement } => {
            if let Some(feature) = require_entitlement {
                let entitled = state.authorizer.is_entitled(&account_id, feature).await?;
                if !entitled {
                    return Err(GatewayError::Forbidden(format!(
                        "account is not entitled to {feature}"
                    ))
                    .into());
                }
            }
            AuthScope::account(account_id)
        },
        AuthPolicy::Internal => {
            if !state.config.internal_allowlist().contains(account_id.as_str()) {
                return Err(
                    GatewayError::Forbidden("account is not an internal account".into()).into()
                );
            }
            AuthScope::internal(account_id)
        },
    };

    debug!(account_id = %scope.account_id, internal = scope.is_internal, "request authenticated");
    req.extensions_mut().insert(scope);

    Ok(next.run(req).await)
}

/// Extracts the global secret from the `X-Global-Token` header.
fn extract_global_token(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-global-token").and_then(|v| v.to_str().ok())
}

/// Issuance gate for the token endpoint.
///
/// The caller proves possession of the global secret itself; the comparison
/// is constant time so the secret cannot be probed byte by byte.
pub async fn issuance_gate(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let supplied = extract_global_token(req.headers())
        .ok_or_else(|| GatewayError::Unauthorized("missing X-Global-Token header".into()))?;

    if !constant_time_eq(supplied, &state.config.global_secret) {
        return Err(GatewayError::Unauthorized("invalid global token".into()).into());
    }

    Ok(next.run(req).await)
}

/// Query parameters as a plain map, for gates that inspect ad-hoc keys.
pub(crate) fn query_map(req: &Request<Body>) -> Result<HashMap<String, String>, ApiError> {
    let Query(map) = Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .map_err(|_| GatewayError::BadRequest("malformed query string".into()))?;
    Ok(map)
}
