//! Collaborator traits the gateway forwards requests to.
//!
//! The gateway owns authentication, validation, and deduplication; the actual
//! log streaming, blob storage, queueing, entitlement, and analysis work is
//! done behind these traits. Handlers depend only on the trait objects, so
//! tests and local runs swap in the in-memory implementations from
//! [`memory`].

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::{AccountId, ArchiveJob, LogLine, SignedLink},
};

pub use memory::{
    MemoryAnalyzer, MemoryAuthorizer, MemoryQueue, MemorySink, MemoryStore, MemoryStream,
};

/// Aggregate counters describing the stream backend, exposed on the debug
/// info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Number of currently open streams.
    pub open_streams: u64,
    /// Total log lines held across all streams.
    pub total_lines: u64,
}

/// Findings produced by the log analyzer for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Stream key the report covers (account-scoped).
    pub key: String,
    /// Human-readable summary of the failure cause.
    pub summary: String,
    /// Individual findings, most significant first.
    pub findings: Vec<String>,
}

/// Live log-stream backend.
///
/// Keys are account-scoped before they reach the backend; see
/// [`AccountId::scoped_key`].
#[async_trait]
pub trait LogStream: Send + Sync {
    /// Opens an empty stream under the given key.
    async fn create(&self, key: &str) -> Result<()>;

    /// Closes and discards the stream.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Appends lines to an open stream.
    async fn write(&self, key: &str, lines: Vec<LogLine>) -> Result<()>;

    /// Returns the lines currently held for the stream.
    async fn tail(&self, key: &str) -> Result<Vec<LogLine>>;

    /// Returns aggregate backend counters.
    async fn info(&self) -> Result<StreamInfo>;

    /// Reachability probe for readiness checks.
    async fn ping(&self) -> Result<()>;
}

/// Persistent blob-store backend.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores a blob under the given key, replacing any existing one.
    async fn upload(&self, key: &str, data: Bytes) -> Result<()>;

    /// Fetches the blob stored under the key.
    async fn download(&self, key: &str) -> Result<Bytes>;

    /// Deletes the blob stored under the key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes every blob whose key starts with the prefix, scanning in
    /// batches of `batch_size` keys, and returns the number removed.
    async fn delete_prefix(&self, prefix: &str, batch_size: usize) -> Result<u64>;

    /// Returns whether a blob exists under the key.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Returns a presigned link the caller can PUT the blob to directly.
    async fn upload_link(&self, key: &str, expires_in: Duration) -> Result<SignedLink>;

    /// Returns a presigned link the caller can GET the blob from directly.
    async fn download_link(&self, key: &str, expires_in: Duration) -> Result<SignedLink>;

    /// Reachability probe for readiness checks.
    async fn ping(&self) -> Result<()>;
}

/// Queue carrying archive-generation jobs from the dispatcher to the worker.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Appends a job to the queue.
    async fn enqueue(&self, job: ArchiveJob) -> Result<()>;

    /// Removes and returns the oldest job, if any.
    async fn dequeue(&self) -> Result<Option<ArchiveJob>>;

    /// Reachability probe for readiness checks.
    async fn ping(&self) -> Result<()>;
}

/// External log-analytics sink the gateway relays write traffic to.
///
/// The relay forwards the validated payload unchanged; the sink owns
/// indexing and retention.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Forwards lines for the account-scoped key to the sink.
    async fn write(&self, key: &str, lines: Vec<LogLine>) -> Result<()>;

    /// Reachability probe, exposed to callers through the relay's ping route.
    async fn ping(&self) -> Result<()>;
}

/// Entitlement lookup for feature-gated routes.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns whether the account is entitled to the named feature.
    async fn is_entitled(&self, account_id: &AccountId, feature: &str) -> Result<bool>;
}

/// Log analyzer backing the root-cause endpoint.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyzes the log lines under the given account-scoped key.
    async fn analyze(&self, key: &str, lines: &[LogLine]) -> Result<AnalysisReport>;
}
