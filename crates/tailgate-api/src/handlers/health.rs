//! Health and readiness handlers.
//!
//! `/healthz` only proves the process serves requests; `/ready/healthz`
//! probes the collaborators the gateway cannot operate without. Neither
//! route sits behind an auth gate, so orchestration probes need no token.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::state::AppState;

/// Readiness check response structure.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness status.
    pub status: ReadinessStatus,
    /// Timestamp when the check was performed.
    pub timestamp: DateTime<Utc>,
    /// Individual collaborator probes.
    pub checks: ReadinessChecks,
    /// Service version information.
    pub version: String,
}

/// Overall readiness status enumeration.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessStatus {
    /// Every probed collaborator answered.
    Ready,
    /// At least one collaborator is down.
    Unready,
}

/// Individual collaborator probe results.
#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    /// Log-stream backend probe.
    pub stream: ComponentHealth,
    /// Blob-store probe.
    pub store: ComponentHealth,
    /// Dedup-cache probe.
    pub cache: ComponentHealth,
}

/// Health status for an individual collaborator.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status.
    pub status: ComponentStatus,
    /// Optional error message if down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Component-level status.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component answered the probe.
    Up,
    /// Component failed the probe.
    Down,
}

fn component(result: tailgate_core::Result<()>, name: &str) -> ComponentHealth {
    match result {
        Ok(()) => ComponentHealth { status: ComponentStatus::Up, message: None },
        Err(e) => {
            error!(component = name, error = %e, "readiness probe failed");
            ComponentHealth { status: ComponentStatus::Down, message: Some(e.to_string()) }
        },
    }
}

/// Liveness endpoint.
///
/// Called frequently by load balancers; does not touch any collaborator.
#[instrument(name = "healthz", skip(state))]
pub async fn healthz(State(state): State<AppState>) -> Response {
    let response = serde_json::json!({
        "status": "ok",
        "timestamp": state.clock.now_utc(),
        "service": "tailgate",
    });

    (StatusCode::OK, Json(response)).into_response()
}

/// Readiness endpoint for orchestration probes.
///
/// Pings the stream backend, the blob store, and the dedup cache; 503 when
/// any of them is down.
#[instrument(name = "readiness", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> Response {
    debug!("performing readiness check");

    let checks = ReadinessChecks {
        stream: component(state.streams.ping().await, "stream"),
        store: component(state.store.ping().await, "store"),
        cache: component(state.cache.ping().await, "cache"),
    };

    let all_up = [&checks.stream, &checks.store, &checks.cache]
        .iter()
        .all(|check| check.status == ComponentStatus::Up);

    let (status, status_code) = if all_up {
        (ReadinessStatus::Ready, StatusCode::OK)
    } else {
        (ReadinessStatus::Unready, StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = ReadinessResponse {
        status,
        timestamp: state.clock.now_utc(),
        checks,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response)).into_response()
}
