//! Middleware gates mounted in front of the dispatcher.
//!
//! Gates run in a fixed order declared at route construction: issuance or
//! account/internal auth first, then parameter validators, then the dedup
//! gate on the archive route. Each gate short-circuits with its own error
//! mapping; handlers only ever see requests that passed every gate.

pub mod auth;
pub mod dedup;
pub mod validate;

pub use auth::{auth_gate, issuance_gate, AuthPolicy};
pub use dedup::dedup_gate;
pub use validate::{require_query_params, validate_prefix};
