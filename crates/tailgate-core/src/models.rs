//! Domain models and strongly-typed identifiers.
//!
//! Defines the account scope every authorization decision is bound to, the
//! request fingerprint used to deduplicate expensive work, and the payload
//! types exchanged with collaborators.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Strongly-typed account identifier.
///
/// The tenant scope every token and authorization decision is bound to.
/// Wraps the caller-supplied string to prevent mixing with stream keys or
/// blob prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    /// Creates an account id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefixes a stream or blob key with this account's namespace.
    ///
    /// All backend keys are account-scoped; an account can never name
    /// another account's data because the scope is applied server-side.
    pub fn scoped_key(&self, key: &str) -> String {
        format!("{}/{}", self.0, key.trim_start_matches('/'))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Authorization result attached to a request after a gate succeeds.
///
/// Lifetime is one request; stored in the request extensions, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthScope {
    /// The account the request is authorized to act on.
    pub account_id: AccountId,
    /// Whether the caller passed the internal gate rather than the general
    /// account gate.
    pub is_internal: bool,
}

impl AuthScope {
    /// Scope produced by the account-auth gate.
    pub fn account(account_id: AccountId) -> Self {
        Self { account_id, is_internal: false }
    }

    /// Scope produced by the internal-auth gate.
    pub fn internal(account_id: AccountId) -> Self {
        Self { account_id, is_internal: true }
    }
}

/// Deterministic key identifying one expensive request.
///
/// Derived from the account, the operation, and the normalized parameters.
/// Used only as a dedup cache key and never persisted beyond the cache
/// entry's TTL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    /// Fingerprint for the archive-link operation over a key prefix.
    ///
    /// The prefix is normalized (surrounding whitespace and trailing slashes
    /// stripped) so equivalent spellings collapse to one fingerprint.
    pub fn archive(account_id: &AccountId, prefix: &str) -> Self {
        let normalized = prefix.trim().trim_end_matches('/');
        Self(format!("zip:{}:{normalized}", account_id.as_str()))
    }

    /// Returns the fingerprint as a cache key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A presigned link to an object in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedLink {
    /// The presigned URL.
    pub url: String,
    /// When the link stops being honored by the store.
    pub expires_at: DateTime<Utc>,
}

/// One line of log output written to or tailed from a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Severity as reported by the producer.
    pub level: String,
    /// The log message text.
    pub message: String,
    /// Position of the line within the stream.
    pub position: u64,
    /// Producer-side timestamp.
    pub timestamp: DateTime<Utc>,
}

/// A unit of archive-generation work handed to the queue collaborator.
///
/// Carries the fingerprint so the worker can transition the dedup entry when
/// the computation finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveJob {
    /// Account the archive is scoped to.
    pub account_id: AccountId,
    /// Key prefix the archive covers.
    pub prefix: String,
    /// Dedup entry to resolve on completion.
    pub fingerprint: RequestFingerprint,
}
