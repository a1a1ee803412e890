//! Test harness for the Tailgate gateway.
//!
//! Wires the full application state against in-memory collaborators and a
//! controllable clock, keeping concrete handles to each so tests can grant
//! entitlements, toggle backend health, advance time, and drain the archive
//! queue deterministically.

#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use tailgate_api::{config::Config, create_router, state::AppState, worker::ArchiveWorker};
use tailgate_core::{
    backend::memory::{
        MemoryAnalyzer, MemoryAuthorizer, MemoryQueue, MemorySink, MemoryStore, MemoryStream,
    },
    AccountId, MemoryDedupCache, TestClock, TokenCodec,
};

/// Shared secret every test environment signs tokens with.
pub const TEST_SECRET: &str = "test-global-secret";

/// Account listed in the internal allowlist of the default test config.
pub const INTERNAL_ACCOUNT: &str = "ops";

/// Full gateway environment over in-memory collaborators.
///
/// Holds the concrete backend handles alongside the assembled `AppState`, so
/// tests reach past the trait objects when they need to arrange state.
pub struct TestEnv {
    /// Assembled application state, as the binary would build it.
    pub state: AppState,
    /// Controllable clock shared by every component.
    pub clock: Arc<TestClock>,
    /// Concrete dedup cache handle.
    pub cache: Arc<MemoryDedupCache>,
    /// Concrete stream backend handle.
    pub streams: Arc<MemoryStream>,
    /// Concrete blob store handle.
    pub store: Arc<MemoryStore>,
    /// Concrete queue handle (exposes the enqueue counter).
    pub queue: Arc<MemoryQueue>,
    /// Concrete entitlement table handle.
    pub authorizer: Arc<MemoryAuthorizer>,
    /// Concrete analytics sink handle.
    pub sink: Arc<MemorySink>,
}

impl TestEnv {
    /// Environment with the default test configuration.
    pub fn new() -> Self {
        Self::with_config(Self::config())
    }

    /// Default test configuration: auth enabled, `ops` internal, debug off.
    pub fn config() -> Config {
        Config {
            global_secret: TEST_SECRET.to_string(),
            internal_accounts: INTERNAL_ACCOUNT.to_string(),
            worker_poll_interval_ms: 10,
            ..Config::default()
        }
    }

    /// Environment with a caller-adjusted configuration.
    pub fn with_config(config: Config) -> Self {
        let clock = Arc::new(TestClock::new());
        let cache = Arc::new(MemoryDedupCache::new(clock.clone()));
        let streams = Arc::new(MemoryStream::new());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let queue = Arc::new(MemoryQueue::new());
        let authorizer = Arc::new(MemoryAuthorizer::new());
        let sink = Arc::new(MemorySink::new());

        let state = AppState {
            codec: Arc::new(TokenCodec::new(config.global_secret.clone())),
            config: Arc::new(config),
            clock: clock.clone(),
            cache: cache.clone(),
            streams: streams.clone(),
            store: store.clone(),
            queue: queue.clone(),
            authorizer: authorizer.clone(),
            analyzer: Arc::new(MemoryAnalyzer::new()),
            sink: sink.clone(),
        };

        Self { state, clock, cache, streams, store, queue, authorizer, sink }
    }

    /// Builds the router exactly as the binary does.
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Issues a valid token for the account, bypassing the HTTP endpoint.
    pub fn issue_token(&self, account: &str) -> String {
        self.state.codec.issue(&AccountId::from(account), self.clock.as_ref()).encode()
    }

    /// Archive worker over this environment's state.
    pub fn worker(&self) -> ArchiveWorker {
        ArchiveWorker::new(self.state.clone())
    }

    /// Drains the archive queue, returning how many jobs were processed.
    pub async fn process_archive_jobs(&self) -> usize {
        let worker = self.worker();
        let mut processed = 0;
        while worker.process_next().await.unwrap_or(false) {
            processed += 1;
        }
        processed
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

/// Builds a GET request for the given URI.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).expect("valid request")
}

/// Builds a bodyless request with the given method.
pub fn req(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).expect("valid request")
}

/// Builds a JSON-bodied request with the given method.
pub fn json_req(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}
