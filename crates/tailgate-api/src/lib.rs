//! Tailgate HTTP gateway.
//!
//! Builds the axum router with the authentication, validation, and
//! deduplication gates in front of the dispatching handlers, plus the
//! background archive worker that resolves claimed dedup entries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod state;
pub mod worker;

pub use config::Config;
pub use error::ApiError;
pub use server::{create_router, start_server};
pub use state::AppState;
pub use worker::ArchiveWorker;
