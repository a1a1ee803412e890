//! Request-deduplication cache protocol.
//!
//! Maps a request fingerprint to the state of an in-flight or completed
//! archive computation. The central correctness property of the gateway: the
//! check-and-create `Pending` step is a single atomic operation, so for any
//! fingerprint exactly one concurrent request claims the computation and all
//! others observe `Pending` or the eventual `Ready` result.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::{GatewayError, Result},
    models::{RequestFingerprint, SignedLink},
    time::Clock,
};

/// State of a dedup entry. Transitions are monotonic: `Pending` moves to
/// `Ready` or `Failed` and both are terminal until the entry expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupState {
    /// The computation has been claimed and is in flight.
    Pending,
    /// The computation finished and the result is cached.
    Ready,
    /// The computation failed; the next request may retry.
    Failed,
}

/// A cached record of one expensive computation.
#[derive(Debug, Clone)]
pub struct DedupEntry {
    /// Current state of the computation.
    pub state: DedupState,
    /// The result link, present once `Ready`.
    pub link: Option<SignedLink>,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// How long the entry stays authoritative.
    pub ttl: Duration,
}

impl DedupEntry {
    /// Returns whether the entry has outlived its TTL at the given time.
    ///
    /// Expired `Pending` entries are stale claims (the claimant died or got
    /// stuck); expired `Ready` entries must not be served. Both are treated
    /// as absent.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        age.to_std().map(|age| age >= self.ttl).unwrap_or(false)
    }
}

/// Outcome of the atomic check-and-create step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// No live entry existed; this caller created `Pending` and owns the
    /// computation.
    Claimed,
    /// Another caller owns a live `Pending` entry; do not recompute.
    InFlight,
    /// A live `Ready` entry exists; serve the cached result.
    Ready(SignedLink),
}

/// The dedup protocol over a TTL'd key-value backing store.
///
/// Backing persistence is an external concern; implementations only have to
/// make `begin` atomic (conditional-put semantics).
#[async_trait]
pub trait DedupCache: Send + Sync {
    /// Atomically claims the fingerprint or reports the existing state.
    ///
    /// Absent, expired, and `Failed` entries are claimable: the call replaces
    /// them with a fresh `Pending` entry and returns `Claimed`. Live
    /// `Pending` and `Ready` entries are returned as-is. The whole
    /// check-and-create must be one atomic operation.
    async fn begin(&self, fp: &RequestFingerprint, ttl: Duration) -> Result<BeginOutcome>;

    /// Transitions `Pending` to `Ready` with the computed result.
    ///
    /// A conditional put: if the entry already reached a terminal state the
    /// claim was superseded, the result is discarded, and the call returns
    /// `Conflict`.
    async fn complete(&self, fp: &RequestFingerprint, link: SignedLink) -> Result<()>;

    /// Transitions `Pending` to `Failed`, releasing the fingerprint for a
    /// later retry.
    async fn fail(&self, fp: &RequestFingerprint) -> Result<()>;

    /// Returns the current entry, if any (expired entries included).
    async fn get(&self, fp: &RequestFingerprint) -> Result<Option<DedupEntry>>;

    /// Removes the entry outright.
    async fn invalidate(&self, fp: &RequestFingerprint) -> Result<()>;

    /// Lightweight reachability probe for readiness checks.
    async fn ping(&self) -> Result<()>;
}

/// In-memory dedup cache.
///
/// The mutex makes `begin` atomic: no two callers can both observe "absent"
/// and both insert `Pending`.
#[derive(Debug)]
pub struct MemoryDedupCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<RequestFingerprint, DedupEntry>>,
}

impl MemoryDedupCache {
    /// Creates an empty cache reading time from the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, entries: Mutex::new(HashMap::new()) }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<RequestFingerprint, DedupEntry>>> {
        self.entries.lock().map_err(|_| GatewayError::internal("dedup cache lock poisoned"))
    }
}

#[async_trait]
impl DedupCache for MemoryDedupCache {
    async fn begin(&self, fp: &RequestFingerprint, ttl: Duration) -> Result<BeginOutcome> {
        let now = self.clock.now_utc();
        let mut entries = self.lock()?;

        if let Some(entry) = entries.get(fp) {
            if !entry.is_expired(now) {
                match entry.state {
                    DedupState::Pending => return Ok(BeginOutcome::InFlight),
                    DedupState::Ready => {
                        if let Some(link) = entry.link.clone() {
                            return Ok(BeginOutcome::Ready(link));
                        }
                        // Ready without a link cannot be served; reclaim.
                    },
                    DedupState::Failed => {},
                }
            }
        }

        entries.insert(
            fp.clone(),
            DedupEntry { state: DedupState::Pending, link: None, created_at: now, ttl },
        );
        Ok(BeginOutcome::Claimed)
    }

    async fn complete(&self, fp: &RequestFingerprint, link: SignedLink) -> Result<()> {
        let mut entries = self.lock()?;
        match entries.get_mut(fp) {
            Some(entry) if entry.state == DedupState::Pending => {
                entry.state = DedupState::Ready;
                entry.link = Some(link);
                Ok(())
            },
            Some(entry) => {
                Err(GatewayError::Conflict(format!("dedup entry for {fp} is {:?}", entry.state)))
            },
            None => Err(GatewayError::NotFound(format!("no dedup entry for {fp}"))),
        }
    }

    async fn fail(&self, fp: &RequestFingerprint) -> Result<()> {
        let mut entries = self.lock()?;
        match entries.get_mut(fp) {
            Some(entry) if entry.state == DedupState::Pending => {
                entry.state = DedupState::Failed;
                entry.link = None;
                Ok(())
            },
            Some(_) => Ok(()),
            None => Err(GatewayError::NotFound(format!("no dedup entry for {fp}"))),
        }
    }

    async fn get(&self, fp: &RequestFingerprint) -> Result<Option<DedupEntry>> {
        Ok(self.lock()?.get(fp).cloned())
    }

    async fn invalidate(&self, fp: &RequestFingerprint) -> Result<()> {
        self.lock()?.remove(fp);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::AccountId, time::TestClock};

    const TTL: Duration = Duration::from_secs(60);

    fn fingerprint(prefix: &str) -> RequestFingerprint {
        RequestFingerprint::archive(&AccountId::from("acct-1"), prefix)
    }

    fn link(clock: &TestClock) -> SignedLink {
        SignedLink {
            url: "https://store.example/archive.zip".to_string(),
            expires_at: clock.now_utc() + chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn first_begin_claims_second_observes_in_flight() {
        let clock = Arc::new(TestClock::new());
        let cache = MemoryDedupCache::new(clock);
        let fp = fingerprint("logs");

        assert_eq!(cache.begin(&fp, TTL).await.unwrap(), BeginOutcome::Claimed);
        assert_eq!(cache.begin(&fp, TTL).await.unwrap(), BeginOutcome::InFlight);
    }

    #[tokio::test]
    async fn ready_entry_served_within_ttl() {
        let clock = Arc::new(TestClock::new());
        let cache = MemoryDedupCache::new(clock.clone());
        let fp = fingerprint("logs");
        let link = link(&clock);

        cache.begin(&fp, TTL).await.unwrap();
        cache.complete(&fp, link.clone()).await.unwrap();

        assert_eq!(cache.begin(&fp, TTL).await.unwrap(), BeginOutcome::Ready(link));
    }

    #[tokio::test]
    async fn expired_ready_entry_is_reclaimed_not_served() {
        let clock = Arc::new(TestClock::new());
        let cache = MemoryDedupCache::new(clock.clone());
        let fp = fingerprint("logs");

        cache.begin(&fp, TTL).await.unwrap();
        cache.complete(&fp, link(&clock)).await.unwrap();

        clock.advance(TTL + Duration::from_secs(1));

        assert_eq!(cache.begin(&fp, TTL).await.unwrap(), BeginOutcome::Claimed);
    }

    #[tokio::test]
    async fn stale_pending_entry_is_reclaimed() {
        let clock = Arc::new(TestClock::new());
        let cache = MemoryDedupCache::new(clock.clone());
        let fp = fingerprint("logs");

        cache.begin(&fp, TTL).await.unwrap();
        clock.advance(TTL + Duration::from_secs(1));

        assert_eq!(cache.begin(&fp, TTL).await.unwrap(), BeginOutcome::Claimed);
    }

    #[tokio::test]
    async fn failed_entry_allows_fresh_attempt() {
        let clock = Arc::new(TestClock::new());
        let cache = MemoryDedupCache::new(clock);
        let fp = fingerprint("logs");

        cache.begin(&fp, TTL).await.unwrap();
        cache.fail(&fp).await.unwrap();

        assert_eq!(cache.begin(&fp, TTL).await.unwrap(), BeginOutcome::Claimed);
    }

    #[tokio::test]
    async fn transitions_are_monotonic() {
        let clock = Arc::new(TestClock::new());
        let cache = MemoryDedupCache::new(clock.clone());
        let fp = fingerprint("logs");
        let link = link(&clock);

        cache.begin(&fp, TTL).await.unwrap();
        cache.complete(&fp, link.clone()).await.unwrap();

        // A late failure report must not demote a Ready entry.
        cache.fail(&fp).await.unwrap();
        assert_eq!(cache.begin(&fp, TTL).await.unwrap(), BeginOutcome::Ready(link));
    }

    #[tokio::test]
    async fn late_completion_of_terminal_entry_conflicts() {
        let clock = Arc::new(TestClock::new());
        let cache = MemoryDedupCache::new(clock.clone());
        let fp = fingerprint("logs");

        cache.begin(&fp, TTL).await.unwrap();
        cache.fail(&fp).await.unwrap();

        let err = cache.complete(&fp, link(&clock)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Conflict(_)));

        // The conflicting put changes nothing; the entry stays claimable.
        assert_eq!(cache.begin(&fp, TTL).await.unwrap(), BeginOutcome::Claimed);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let clock = Arc::new(TestClock::new());
        let cache = MemoryDedupCache::new(clock);
        let fp = fingerprint("logs");

        cache.begin(&fp, TTL).await.unwrap();
        cache.invalidate(&fp).await.unwrap();

        assert!(cache.get(&fp).await.unwrap().is_none());
        assert_eq!(cache.begin(&fp, TTL).await.unwrap(), BeginOutcome::Claimed);
    }

    #[tokio::test]
    async fn exactly_one_concurrent_begin_claims() {
        let clock = Arc::new(TestClock::new());
        let cache = Arc::new(MemoryDedupCache::new(clock));
        let fp = fingerprint("logs");

        let mut handles = Vec::new();
        for _ in 0..50 {
            let cache = cache.clone();
            let fp = fp.clone();
            handles.push(tokio::spawn(async move { cache.begin(&fp, TTL).await.unwrap() }));
        }

        let mut claimed = 0;
        let mut in_flight = 0;
        for handle in handles {
            match handle.await.unwrap() {
                BeginOutcome::Claimed => claimed += 1,
                BeginOutcome::InFlight => in_flight += 1,
                BeginOutcome::Ready(_) => panic!("no result was ever published"),
            }
        }

        assert_eq!(claimed, 1);
        assert_eq!(in_flight, 49);
    }
}
