//! Deterministic sampler for engine tests.

use super::{ProbeError, Sample, Sampler};
use crate::throughput::{TransferResult, TransferStats};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Replays queued outcomes per URL and records every call in order.
#[derive(Default)]
pub struct ScriptedSampler {
    latency: Mutex<HashMap<String, VecDeque<Sample>>>,
    transfers: Mutex<HashMap<String, VecDeque<TransferResult>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok_ms(ms: f64) -> Sample {
        Sample::Success {
            value: ms,
            elapsed: Duration::from_secs_f64(ms / 1000.0),
        }
    }

    pub fn timeout() -> Sample {
        Sample::Failure {
            error: ProbeError::Timeout { timeout_ms: 5000 },
            elapsed: Duration::from_secs(5),
        }
    }

    pub fn transfer(bytes: u64, secs: f64) -> TransferResult {
        TransferStats::measure(bytes, Duration::from_secs_f64(secs)).into()
    }

    pub fn with_latency(self, url: &str, samples: Vec<Sample>) -> Self {
        self.latency
            .lock()
            .unwrap()
            .insert(url.to_string(), samples.into());
        self
    }

    pub fn with_transfers(self, url: &str, results: Vec<TransferResult>) -> Self {
        self.transfers
            .lock()
            .unwrap()
            .insert(url.to_string(), results.into());
        self
    }

    /// Calls in the order they were made, as `"<kind> <url>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, kind: &str, url: &str) {
        self.calls.lock().unwrap().push(format!("{} {}", kind, url));
    }

    fn next_transfer(&self, url: &str) -> TransferResult {
        self.transfers
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| TransferResult::failed(&ProbeError::Connect("unscripted".into())))
    }
}

#[async_trait::async_trait]
impl Sampler for ScriptedSampler {
    async fn probe_latency(&self, url: &str, _timeout: Duration) -> Sample {
        self.record("latency", url);
        self.latency
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(Self::timeout)
    }

    async fn probe_download(&self, url: &str, _timeout: Duration) -> TransferResult {
        self.record("download", url);
        self.next_transfer(url)
    }

    async fn probe_upload(
        &self,
        url: &str,
        _payload_size_bytes: usize,
        _timeout: Duration,
    ) -> TransferResult {
        self.record("upload", url);
        self.next_transfer(url)
    }
}
