//! Shared application state handed to every gate and handler.

use std::sync::Arc;

use tailgate_core::{
    backend::memory::{
        MemoryAnalyzer, MemoryAuthorizer, MemoryQueue, MemorySink, MemoryStore, MemoryStream,
    },
    Analyzer, Authorizer, BlobStore, Clock, DedupCache, LogSink, LogStream, MemoryDedupCache,
    TokenCodec, WorkQueue,
};

use crate::config::Config;

/// Application state shared across the router and the archive worker.
///
/// Collaborators are trait objects so the binary, the tests, and any future
/// real backends wire in the same way.
#[derive(Clone)]
pub struct AppState {
    /// Immutable gateway configuration.
    pub config: Arc<Config>,
    /// Clock used for token issuance and TTL decisions.
    pub clock: Arc<dyn Clock>,
    /// Token codec bound to the global secret.
    pub codec: Arc<TokenCodec>,
    /// Dedup cache for the archive-link operation.
    pub cache: Arc<dyn DedupCache>,
    /// Live log-stream backend.
    pub streams: Arc<dyn LogStream>,
    /// Blob store backend.
    pub store: Arc<dyn BlobStore>,
    /// Archive job queue.
    pub queue: Arc<dyn WorkQueue>,
    /// Entitlement lookup.
    pub authorizer: Arc<dyn Authorizer>,
    /// Log analyzer relay.
    pub analyzer: Arc<dyn Analyzer>,
    /// External log-analytics sink.
    pub sink: Arc<dyn LogSink>,
}

impl AppState {
    /// Wires the state with in-memory collaborators.
    ///
    /// Used by the binary for local runs and by the test harness. The
    /// entitlement table starts empty; grant through the authorizer handle
    /// where a test needs it.
    pub fn in_memory(config: Config, clock: Arc<dyn Clock>) -> Self {
        let codec = Arc::new(TokenCodec::new(config.global_secret.clone()));
        Self {
            config: Arc::new(config),
            clock: clock.clone(),
            codec,
            cache: Arc::new(MemoryDedupCache::new(clock.clone())),
            streams: Arc::new(MemoryStream::new()),
            store: Arc::new(MemoryStore::new(clock)),
            queue: Arc::new(MemoryQueue::new()),
            authorizer: Arc::new(MemoryAuthorizer::new()),
            analyzer: Arc::new(MemoryAnalyzer::new()),
            sink: Arc::new(MemorySink::new()),
        }
    }
}
