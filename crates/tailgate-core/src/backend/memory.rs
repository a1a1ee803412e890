//! In-memory collaborator implementations.
//!
//! Back local runs and the integration test suite. Each backend carries a
//! `healthy` toggle so readiness-probe behavior can be exercised without a
//! real outage.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    error::{GatewayError, Result},
    models::{AccountId, ArchiveJob, LogLine, SignedLink},
    time::Clock,
};

use super::{
    AnalysisReport, Analyzer, Authorizer, BlobStore, LogSink, LogStream, StreamInfo, WorkQueue,
};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| GatewayError::internal(format!("{what} lock poisoned")))
}

fn check_healthy(healthy: &AtomicBool, what: &str) -> Result<()> {
    if healthy.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(GatewayError::internal(format!("{what} unavailable")))
    }
}

/// In-memory log-stream backend.
#[derive(Debug)]
pub struct MemoryStream {
    streams: Mutex<HashMap<String, Vec<LogLine>>>,
    healthy: AtomicBool,
}

impl MemoryStream {
    /// Creates an empty, healthy backend.
    pub fn new() -> Self {
        Self { streams: Mutex::new(HashMap::new()), healthy: AtomicBool::new(true) }
    }

    /// Flips the health toggle observed by `ping`.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }
}

#[async_trait]
impl LogStream for MemoryStream {
    async fn create(&self, key: &str) -> Result<()> {
        lock(&self.streams, "stream")?.entry(key.to_string()).or_default();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        lock(&self.streams, "stream")?.remove(key);
        Ok(())
    }

    async fn write(&self, key: &str, lines: Vec<LogLine>) -> Result<()> {
        let mut streams = lock(&self.streams, "stream")?;
        let stream = streams
            .get_mut(key)
            .ok_or_else(|| GatewayError::NotFound(format!("stream {key} not open")))?;
        stream.extend(lines);
        Ok(())
    }

    async fn tail(&self, key: &str) -> Result<Vec<LogLine>> {
        lock(&self.streams, "stream")?
            .get(key)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("stream {key} not open")))
    }

    async fn info(&self) -> Result<StreamInfo> {
        let streams = lock(&self.streams, "stream")?;
        Ok(StreamInfo {
            open_streams: streams.len() as u64,
            total_lines: streams.values().map(|lines| lines.len() as u64).sum(),
        })
    }

    async fn ping(&self) -> Result<()> {
        check_healthy(&self.healthy, "stream backend")
    }
}

/// In-memory blob store issuing fake presigned links.
#[derive(Debug)]
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    blobs: Mutex<HashMap<String, Bytes>>,
    healthy: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty, healthy store stamping link expiry from the clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, blobs: Mutex::new(HashMap::new()), healthy: AtomicBool::new(true) }
    }

    /// Flips the health toggle observed by `ping`.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }

    fn link(&self, verb: &str, key: &str, expires_in: Duration) -> SignedLink {
        let expires_at = self.clock.now_utc()
            + chrono::Duration::from_std(expires_in).unwrap_or(chrono::Duration::zero());
        SignedLink { url: format!("memory://{verb}/{key}"), expires_at }
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn upload(&self, key: &str, data: Bytes) -> Result<()> {
        lock(&self.blobs, "blob")?.insert(key.to_string(), data);
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Bytes> {
        lock(&self.blobs, "blob")?
            .get(key)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("blob {key} not found")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        lock(&self.blobs, "blob")?.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str, batch_size: usize) -> Result<u64> {
        let batch_size = batch_size.max(1);
        let mut removed = 0u64;
        loop {
            let mut blobs = lock(&self.blobs, "blob")?;
            let batch: Vec<String> = blobs
                .keys()
                .filter(|key| key.starts_with(prefix))
                .take(batch_size)
                .cloned()
                .collect();
            if batch.is_empty() {
                return Ok(removed);
            }
            for key in batch {
                blobs.remove(&key);
                removed += 1;
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(lock(&self.blobs, "blob")?.contains_key(key))
    }

    async fn upload_link(&self, key: &str, expires_in: Duration) -> Result<SignedLink> {
        check_healthy(&self.healthy, "blob store")?;
        Ok(self.link("put", key, expires_in))
    }

    async fn download_link(&self, key: &str, expires_in: Duration) -> Result<SignedLink> {
        check_healthy(&self.healthy, "blob store")?;
        Ok(self.link("get", key, expires_in))
    }

    async fn ping(&self) -> Result<()> {
        check_healthy(&self.healthy, "blob store")
    }
}

/// In-memory FIFO work queue.
#[derive(Debug)]
pub struct MemoryQueue {
    jobs: Mutex<VecDeque<ArchiveJob>>,
    enqueued: AtomicU64,
    healthy: AtomicBool,
}

impl MemoryQueue {
    /// Creates an empty, healthy queue.
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            enqueued: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    /// Total jobs enqueued over the queue's lifetime.
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Acquire)
    }

    /// Flips the health toggle observed by `ping`.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn enqueue(&self, job: ArchiveJob) -> Result<()> {
        lock(&self.jobs, "queue")?.push_back(job);
        self.enqueued.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<ArchiveJob>> {
        Ok(lock(&self.jobs, "queue")?.pop_front())
    }

    async fn ping(&self) -> Result<()> {
        check_healthy(&self.healthy, "work queue")
    }
}

/// In-memory log-analytics sink.
#[derive(Debug)]
pub struct MemorySink {
    records: Mutex<HashMap<String, Vec<LogLine>>>,
    healthy: AtomicBool,
}

impl MemorySink {
    /// Creates an empty, healthy sink.
    pub fn new() -> Self {
        Self { records: Mutex::new(HashMap::new()), healthy: AtomicBool::new(true) }
    }

    /// Flips the health toggle observed by `ping` and `write`.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }

    /// Lines forwarded so far under the given key.
    pub fn recorded(&self, key: &str) -> Vec<LogLine> {
        self.records
            .lock()
            .map(|records| records.get(key).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn write(&self, key: &str, lines: Vec<LogLine>) -> Result<()> {
        check_healthy(&self.healthy, "analytics sink")?;
        lock(&self.records, "sink")?.entry(key.to_string()).or_default().extend(lines);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        check_healthy(&self.healthy, "analytics sink")
    }
}

/// In-memory entitlement table.
///
/// Grants are (account, feature) pairs; `allow_all` short-circuits the table
/// for tests that are not about entitlement.
#[derive(Debug, Default)]
pub struct MemoryAuthorizer {
    allow_all: bool,
    grants: Mutex<HashSet<(String, String)>>,
}

impl MemoryAuthorizer {
    /// Creates an authorizer that denies everything not explicitly granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an authorizer that grants every lookup.
    pub fn allow_all() -> Self {
        Self { allow_all: true, grants: Mutex::new(HashSet::new()) }
    }

    /// Grants the account access to the feature.
    pub fn grant(&self, account_id: &AccountId, feature: &str) {
        if let Ok(mut grants) = self.grants.lock() {
            grants.insert((account_id.as_str().to_string(), feature.to_string()));
        }
    }
}

#[async_trait]
impl Authorizer for MemoryAuthorizer {
    async fn is_entitled(&self, account_id: &AccountId, feature: &str) -> Result<bool> {
        if self.allow_all {
            return Ok(true);
        }
        let grants = lock(&self.grants, "authorizer")?;
        Ok(grants.contains(&(account_id.as_str().to_string(), feature.to_string())))
    }
}

/// Analyzer that surfaces error-level lines as findings.
#[derive(Debug, Default)]
pub struct MemoryAnalyzer;

impl MemoryAnalyzer {
    /// Creates the analyzer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Analyzer for MemoryAnalyzer {
    async fn analyze(&self, key: &str, lines: &[LogLine]) -> Result<AnalysisReport> {
        let findings: Vec<String> = lines
            .iter()
            .filter(|line| line.level.eq_ignore_ascii_case("error"))
            .map(|line| line.message.clone())
            .collect();

        let summary = if findings.is_empty() {
            "no error-level lines found".to_string()
        } else {
            format!("{} error-level lines found", findings.len())
        };

        Ok(AnalysisReport { key: key.to_string(), summary, findings })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::time::TestClock;

    fn line(level: &str, message: &str, position: u64) -> LogLine {
        LogLine {
            level: level.to_string(),
            message: message.to_string(),
            position,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn stream_write_requires_open_stream() {
        let stream = MemoryStream::new();

        let err = stream.write("acct-1/logs", vec![line("info", "hello", 0)]).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));

        stream.create("acct-1/logs").await.unwrap();
        stream.write("acct-1/logs", vec![line("info", "hello", 0)]).await.unwrap();

        let lines = stream.tail("acct-1/logs").await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].message, "hello");
    }

    #[tokio::test]
    async fn stream_info_counts_streams_and_lines() {
        let stream = MemoryStream::new();
        stream.create("acct-1/a").await.unwrap();
        stream.create("acct-1/b").await.unwrap();
        stream.write("acct-1/a", vec![line("info", "x", 0), line("info", "y", 1)]).await.unwrap();

        let info = stream.info().await.unwrap();
        assert_eq!(info.open_streams, 2);
        assert_eq!(info.total_lines, 2);
    }

    #[tokio::test]
    async fn unhealthy_backends_fail_ping() {
        let stream = MemoryStream::new();
        assert!(stream.ping().await.is_ok());
        stream.set_healthy(false);
        assert!(stream.ping().await.is_err());
    }

    #[tokio::test]
    async fn store_delete_prefix_removes_matching_blobs() {
        let store = MemoryStore::new(Arc::new(TestClock::new()));
        store.upload("acct-1/logs/a", Bytes::from_static(b"a")).await.unwrap();
        store.upload("acct-1/logs/b", Bytes::from_static(b"b")).await.unwrap();
        store.upload("acct-2/logs/a", Bytes::from_static(b"c")).await.unwrap();

        // batch size smaller than the match count forces multiple scans
        let removed = store.delete_prefix("acct-1/", 1).await.unwrap();
        assert_eq!(removed, 2);
        assert!(!store.exists("acct-1/logs/a").await.unwrap());
        assert!(store.exists("acct-2/logs/a").await.unwrap());
    }

    #[tokio::test]
    async fn store_links_expire_relative_to_clock() {
        let clock = Arc::new(TestClock::new());
        let store = MemoryStore::new(clock.clone());

        let link = store.download_link("acct-1/zip", Duration::from_secs(600)).await.unwrap();
        assert_eq!(link.expires_at, clock.now_utc() + chrono::Duration::seconds(600));
    }

    #[tokio::test]
    async fn queue_is_fifo_and_counts_enqueues() {
        let queue = MemoryQueue::new();
        let account = AccountId::from("acct-1");

        for prefix in ["a", "b"] {
            queue
                .enqueue(ArchiveJob {
                    account_id: account.clone(),
                    prefix: prefix.to_string(),
                    fingerprint: crate::models::RequestFingerprint::archive(&account, prefix),
                })
                .await
                .unwrap();
        }

        assert_eq!(queue.enqueued_count(), 2);
        assert_eq!(queue.dequeue().await.unwrap().unwrap().prefix, "a");
        assert_eq!(queue.dequeue().await.unwrap().unwrap().prefix, "b");
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sink_accumulates_lines_per_key() {
        let sink = MemorySink::new();
        sink.write("acct-1/logs", vec![line("info", "first", 0)]).await.unwrap();
        sink.write("acct-1/logs", vec![line("info", "second", 1)]).await.unwrap();

        let recorded = sink.recorded("acct-1/logs");
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].message, "second");
        assert!(sink.recorded("acct-2/logs").is_empty());

        sink.set_healthy(false);
        assert!(sink.write("acct-1/logs", vec![line("info", "third", 2)]).await.is_err());
        assert!(sink.ping().await.is_err());
    }

    #[tokio::test]
    async fn authorizer_checks_grants() {
        let authorizer = MemoryAuthorizer::new();
        let account = AccountId::from("acct-1");

        assert!(!authorizer.is_entitled(&account, "rca").await.unwrap());
        authorizer.grant(&account, "rca");
        assert!(authorizer.is_entitled(&account, "rca").await.unwrap());
        assert!(!authorizer.is_entitled(&AccountId::from("acct-2"), "rca").await.unwrap());
    }

    #[tokio::test]
    async fn analyzer_reports_error_lines() {
        let analyzer = MemoryAnalyzer::new();
        let lines = vec![
            line("info", "starting", 0),
            line("ERROR", "disk full", 1),
            line("error", "write failed", 2),
        ];

        let report = analyzer.analyze("acct-1/logs", &lines).await.unwrap();
        assert_eq!(report.findings, vec!["disk full", "write failed"]);
        assert_eq!(report.key, "acct-1/logs");
    }
}
