//! Parameter validators.
//!
//! Composable, order-independent checks that fail fast with 400 and a
//! machine-readable reason. Validators never touch auth state and always run
//! before the dedup gate, so an invalid request can never create a cache
//! entry.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tailgate_core::GatewayError;

use crate::{error::ApiError, middleware::auth::query_map};

/// Rejects requests missing any of the required query parameters.
///
/// The parameter list is route state, fixed at construction.
pub async fn require_query_params(
    State(required): State<&'static [&'static str]>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let params = query_map(&req)?;

    for name in required {
        let present = params.get(*name).is_some_and(|value| !value.trim().is_empty());
        if !present {
            return Err(GatewayError::BadRequest(format!(
                "missing required query parameter: {name}"
            ))
            .into());
        }
    }

    Ok(next.run(req).await)
}

/// Rejects malformed `prefix` query parameters.
///
/// A prefix must stay inside the account namespace: relative, no parent
/// traversal. Emptiness is covered by [`require_query_params`].
pub async fn validate_prefix(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let params = query_map(&req)?;

    if let Some(prefix) = params.get("prefix") {
        let prefix = prefix.trim();
        if prefix.starts_with('/') {
            return Err(GatewayError::BadRequest("prefix must be relative".into()).into());
        }
        if prefix.split('/').any(|segment| segment == "..") {
            return Err(
                GatewayError::BadRequest("prefix must not contain parent traversal".into()).into()
            );
        }
    }

    Ok(next.run(req).await)
}
