//! Tailgate gateway service.
//!
//! Main entry point. Loads configuration, initializes tracing, wires the
//! application state, spawns the archive worker, and serves HTTP until a
//! shutdown signal arrives.

use std::sync::Arc;

use anyhow::{Context, Result};
use tailgate_api::{start_server, AppState, ArchiveWorker, Config};
use tailgate_core::RealClock;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.rust_log);

    info!(
        host = %config.host,
        port = config.port,
        global_secret = %config.global_secret_masked(),
        disable_auth = config.disable_auth,
        debug = config.debug,
        "Configuration loaded"
    );
    if config.disable_auth {
        tracing::warn!("auth gates are DISABLED; every route accepts unauthenticated requests");
    }

    let addr = config.parse_server_addr()?;
    let state = AppState::in_memory(config, Arc::new(RealClock::new()));

    let shutdown = CancellationToken::new();
    let worker = ArchiveWorker::new(state.clone());
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    info!(addr = %addr, "Tailgate is ready");
    start_server(state, addr).await.context("server error")?;

    shutdown.cancel();
    worker_handle.await.ok();

    info!("Tailgate shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing(directives: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
