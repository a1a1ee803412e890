//! HTTP server configuration and request routing.
//!
//! The route table is built once at startup from immutable config. Auth and
//! debug flags decide which gates and routes are mounted; nothing about the
//! table changes per request. Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Timeout enforcement
//! 4. Route gates (issuance / account / internal auth, validators, dedup)
//! 5. Handler execution
//!
//! # Graceful Shutdown
//!
//! The server handles SIGTERM and CTRL+C: it stops accepting connections and
//! waits for in-flight requests before returning.

use std::{net::SocketAddr, time::Duration};

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::{
    handlers,
    middleware::{auth_gate, dedup_gate, issuance_gate, require_query_params, validate_prefix, AuthPolicy},
    state::AppState,
};

const TOKEN_ONLY: AuthPolicy = AuthPolicy::AccountScoped { require_entitlement: None };
const RCA_ENTITLED: AuthPolicy = AuthPolicy::AccountScoped { require_entitlement: Some("rca") };
const ARCHIVE_PARAMS: &[&str] = &["accountID", "prefix"];

/// Creates the axum router with all routes and gates.
///
/// With `disable_auth` set, the auth gates are simply not mounted; the
/// validators and the dedup gate always are.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let health_routes = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/ready/healthz", get(handlers::readiness));

    let mut token_routes = Router::new().route("/token", get(handlers::issue_token));
    if !config.disable_auth {
        token_routes =
            token_routes.layer(middleware::from_fn_with_state(state.clone(), issuance_gate));
    }

    let mut account_routes = Router::new()
        .route(
            "/stream",
            post(handlers::open_stream)
                .delete(handlers::close_stream)
                .put(handlers::write_stream)
                .get(handlers::tail_stream),
        )
        .route("/stream/info", get(handlers::stream_info))
        .route(
            "/blob",
            post(handlers::upload_blob)
                .get(handlers::download_blob)
                .delete(handlers::delete_blob),
        )
        .route("/blob/exists", get(handlers::blob_exists))
        .route("/blob/link/upload", post(handlers::upload_link))
        .route("/blob/link/download", post(handlers::download_link));
    if !config.disable_auth {
        account_routes = account_routes.layer(middleware::from_fn_with_state(
            (state.clone(), TOKEN_ONLY),
            auth_gate,
        ));
    }

    // Layers execute outermost-last-added: auth, then validators, then the
    // dedup gate, so an invalid request never creates a cache entry.
    let mut archive_routes = Router::new()
        .route("/blob/download", post(handlers::request_archive))
        .layer(middleware::from_fn_with_state(state.clone(), dedup_gate))
        .layer(middleware::from_fn(validate_prefix))
        .layer(middleware::from_fn_with_state(ARCHIVE_PARAMS, require_query_params));
    if !config.disable_auth {
        archive_routes = archive_routes.layer(middleware::from_fn_with_state(
            (state.clone(), TOKEN_ONLY),
            auth_gate,
        ));
    }

    let mut rca_routes = Router::new().route("/rca", post(handlers::rca));
    if !config.disable_auth {
        rca_routes = rca_routes.layer(middleware::from_fn_with_state(
            (state.clone(), RCA_ENTITLED),
            auth_gate,
        ));
    }

    let mut analytics_routes = Router::new()
        .route("/analytics", post(handlers::forward_analytics).get(handlers::analytics_ping));
    if !config.disable_auth {
        analytics_routes = analytics_routes.layer(middleware::from_fn_with_state(
            (state.clone(), TOKEN_ONLY),
            auth_gate,
        ));
    }

    let mut internal_routes = Router::new().route("/internal/blob", delete(handlers::purge_blobs));
    if config.debug {
        internal_routes = internal_routes.route("/info/stream", get(handlers::stream_info));
    }
    if !config.disable_auth {
        internal_routes = internal_routes.layer(middleware::from_fn_with_state(
            (state.clone(), AuthPolicy::Internal),
            auth_gate,
        ));
    }

    Router::new()
        .merge(health_routes)
        .merge(token_routes)
        .merge(account_routes)
        .merge(archive_routes)
        .merge(rca_routes)
        .merge(analytics_routes)
        .merge(internal_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Binds to the specified address and serves requests until a shutdown
/// signal is received.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
