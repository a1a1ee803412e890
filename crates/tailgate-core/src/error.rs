//! Error taxonomy for gateway operations.
//!
//! Every failure is attributed to one of these kinds before it reaches the
//! caller-visible layer. Each middleware gate owns detection and mapping of
//! its own kinds; collaborator failures are wrapped as `Internal` and never
//! leak backend details across the boundary.

use thiserror::Error;

/// Result type alias using `GatewayError`.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway error taxonomy with stable codes for client disambiguation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or missing input; recoverable by fixing the request (E1001).
    #[error("[E1001] Bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid token; caller must re-authenticate (E1002).
    #[error("[E1002] Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid identity but insufficient entitlement (E1003).
    #[error("[E1003] Forbidden: {0}")]
    Forbidden(String),

    /// Target stream, blob, or dedup entry absent (E1004).
    #[error("[E1004] Not found: {0}")]
    NotFound(String),

    /// A dedup entry for this fingerprint is already pending (E1005).
    #[error("[E1005] Conflict: {0}")]
    Conflict(String),

    /// Collaborator failure; surfaced as a generic 5xx (E3001).
    #[error("[E3001] Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the stable error code for this kind.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "E1001",
            Self::Unauthorized(_) => "E1002",
            Self::Forbidden(_) => "E1003",
            Self::NotFound(_) => "E1004",
            Self::Conflict(_) => "E1005",
            Self::Internal(_) => "E3001",
        }
    }

    /// Returns whether the caller can recover by retrying later.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Internal(_))
    }

    /// Wraps a collaborator failure without leaking its internals.
    ///
    /// The original error is logged at the call site; the caller only ever
    /// sees the generic message.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}
