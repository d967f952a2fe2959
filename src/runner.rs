//! Test cycle orchestration.
//!
//! A full cycle runs, strictly one probe at a time:
//! 1. latency suite over every ping target
//! 2. download suite over the download targets, in order
//! 3. one upload
//! 4. assemble the [`RunResult`] and append it to history
//!
//! Partial cycles return a single component's result and are not persisted.

use std::sync::Arc;

use tracing::{error, info};

use crate::analysis::{run_download_suite, run_latency_suite, PingResults};
use crate::config::Config;
use crate::probes::Sampler;
use crate::storage::{HistoryError, HistoryRepository, RunResult};
use crate::throughput::TransferResult;

/// Outcome of a full cycle. The result is always present; saving may have failed.
#[derive(Debug)]
pub struct CycleReport {
    pub result: RunResult,
    pub persist_error: Option<HistoryError>,
}

impl CycleReport {
    pub fn persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

/// Drives the engine. Sampler and history are injected so either can be swapped.
pub struct TestRunner {
    sampler: Arc<dyn Sampler>,
    history: Arc<dyn HistoryRepository>,
    config: Config,
}

impl TestRunner {
    pub fn new(
        sampler: Arc<dyn Sampler>,
        history: Arc<dyn HistoryRepository>,
        config: Config,
    ) -> Self {
        Self {
            sampler,
            history,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run_full(&self) -> CycleReport {
        info!("Starting full test cycle");

        let ping = self.run_ping().await;

        let download = run_download_suite(
            self.sampler.as_ref(),
            &self.config.targets.download,
            self.config.transfer_timeout(),
            self.config.inter_request_delay(),
        )
        .await;

        let upload = self.upload(self.config.transfer.upload_size_bytes).await;

        let result = RunResult::new(ping, download, upload);

        let persist_error = match self.history.append(&result) {
            Ok(()) => None,
            Err(e) => {
                error!(error = %e, "Failed to save run to history");
                Some(e)
            }
        };

        info!("Full test cycle complete");
        CycleReport {
            result,
            persist_error,
        }
    }

    /// Latency suite only.
    pub async fn run_ping(&self) -> PingResults {
        run_latency_suite(
            self.sampler.as_ref(),
            &self.config.targets.ping,
            &self.config.latency_options(),
        )
        .await
    }

    /// One download against the configured quick target (the middle size by default).
    pub async fn run_download(&self) -> TransferResult {
        let targets = &self.config.targets.download;
        let Some(last) = targets.len().checked_sub(1) else {
            return TransferResult::Failed {
                error: "no download targets configured".to_string(),
            };
        };
        let url = &targets[self.config.transfer.quick_download_index.min(last)];
        info!(%url, "Running single download");
        self.sampler
            .probe_download(url, self.config.transfer_timeout())
            .await
    }

    /// One upload with the smaller quick payload.
    pub async fn run_upload(&self) -> TransferResult {
        self.upload(self.config.transfer.quick_upload_size_bytes)
            .await
    }

    /// The most recent `limit` runs, oldest first.
    pub fn history(&self, limit: usize) -> Result<Vec<RunResult>, HistoryError> {
        self.history.load(limit)
    }

    async fn upload(&self, size_bytes: usize) -> TransferResult {
        let url = &self.config.targets.upload;
        info!(%url, size_bytes, "Uploading test payload");
        self.sampler
            .probe_upload(url, size_bytes, self.config.transfer_timeout())
            .await
    }
}
