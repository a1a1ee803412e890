//! Background archive worker.
//!
//! Consumes `ArchiveJob`s from the queue and completes the dedup protocol:
//! it resolves a presigned download link for the archive and transitions the
//! claimed entry to `Ready`, or to `Failed` so a later request can retry.
//! Building the archive itself is the store's concern, not the gateway's.

use tailgate_core::{ArchiveJob, GatewayError, Result, SignedLink};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::state::AppState;

/// Worker loop resolving claimed archive computations.
#[derive(Clone)]
pub struct ArchiveWorker {
    state: AppState,
}

impl ArchiveWorker {
    /// Creates a worker over the shared application state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Runs until the token is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let poll_interval = self.state.config.worker_poll_interval();
        info!("archive worker started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("archive worker stopping");
                    break;
                },
                () = async {
                    match self.process_next().await {
                        Ok(true) => {},
                        Ok(false) => self.state.clock.sleep(poll_interval).await,
                        Err(e) => {
                            error!(error = %e, "archive worker iteration failed");
                            self.state.clock.sleep(poll_interval).await;
                        },
                    }
                } => {},
            }
        }
    }

    /// Processes one queued job, if any. Returns whether a job was taken.
    ///
    /// Exposed so tests can drain the queue deterministically without the
    /// poll loop.
    pub async fn process_next(&self) -> Result<bool> {
        let Some(job) = self.state.queue.dequeue().await? else {
            return Ok(false);
        };

        match self.resolve(&job).await {
            Ok(link) => match self.state.cache.complete(&job.fingerprint, link).await {
                Ok(()) => debug!(fingerprint = %job.fingerprint, "archive link published"),
                // The claim was superseded while the job was in flight;
                // drop the result and move on.
                Err(GatewayError::Conflict(reason)) => {
                    warn!(fingerprint = %job.fingerprint, %reason, "archive result discarded");
                },
                Err(e) => return Err(e),
            },
            Err(e) => {
                warn!(fingerprint = %job.fingerprint, error = %e, "archive resolution failed");
                self.state.cache.fail(&job.fingerprint).await?;
            },
        }

        Ok(true)
    }

    async fn resolve(&self, job: &ArchiveJob) -> Result<SignedLink> {
        let key = format!("{}.zip", job.account_id.scoped_key(&job.prefix));
        self.state.store.download_link(&key, self.state.config.dedup_ttl()).await
    }
}
