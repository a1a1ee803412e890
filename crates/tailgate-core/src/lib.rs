//! Core domain types for the Tailgate gateway.
//!
//! Provides strongly-typed account identifiers, the error taxonomy shared by
//! every gate, the account-token codec, the dedup cache protocol, and the
//! collaborator traits the dispatcher forwards to. All other crates depend on
//! these foundational types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod dedup;
pub mod error;
pub mod models;
pub mod time;
pub mod token;

pub use backend::{
    AnalysisReport, Analyzer, Authorizer, BlobStore, LogSink, LogStream, StreamInfo, WorkQueue,
};
pub use dedup::{BeginOutcome, DedupCache, DedupEntry, DedupState, MemoryDedupCache};
pub use error::{GatewayError, Result};
pub use models::{AccountId, ArchiveJob, AuthScope, LogLine, RequestFingerprint, SignedLink};
pub use time::{Clock, RealClock, TestClock};
pub use token::{AccountToken, TokenCodec};
