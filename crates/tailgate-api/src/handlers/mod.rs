//! Request handlers behind the middleware gates.
//!
//! Handlers never re-interpret auth failures; by the time one runs, every
//! gate on its route has passed. They translate the request into collaborator
//! calls and map collaborator failures to the generic internal error.

pub mod analysis;
pub mod analytics;
pub mod archive;
pub mod blob;
pub mod health;
pub mod internal;
pub mod stream;
pub mod token;

pub use analysis::rca;
pub use analytics::{analytics_ping, forward_analytics};
pub use archive::request_archive;
pub use blob::{blob_exists, delete_blob, download_blob, download_link, upload_blob, upload_link};
pub use health::{healthz, readiness};
pub use internal::purge_blobs;
pub use stream::{close_stream, open_stream, stream_info, tail_stream, write_stream};
pub use token::issue_token;
