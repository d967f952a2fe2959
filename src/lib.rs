//! linkgauge -- network path quality measurement.
//!
//! This crate provides the measurement engine: timed latency, download and
//! upload probes, partial-failure tolerant aggregation, tier classification,
//! and a bounded on-disk history of full runs.

pub mod analysis;
pub mod config;
pub mod probes;
pub mod runner;
pub mod storage;
pub mod throughput;

use std::sync::Arc;

use anyhow::Result;

/// Build a runner wired to the HTTP sampler and the JSON history file named in `config`.
pub fn runner_from_config(config: config::Config) -> Result<runner::TestRunner> {
    let sampler = probes::HttpSampler::new()?;
    let history =
        storage::JsonHistoryStore::new(config.history.path.clone(), config.history.max_entries);
    tracing::debug!(history = %history.path().display(), "Initializing runner");
    Ok(runner::TestRunner::new(
        Arc::new(sampler),
        Arc::new(history),
        config,
    ))
}
