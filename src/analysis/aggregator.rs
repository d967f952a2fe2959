use crate::analysis::stats::{self, TargetSummary};
use crate::probes::{Sample, Sampler};
use crate::throughput::TransferResult;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Parameters of a latency suite.
#[derive(Debug, Clone, Copy)]
pub struct LatencySuiteOptions {
    pub attempts_per_target: u32,
    pub inter_attempt_delay: Duration,
    pub timeout: Duration,
}

impl Default for LatencySuiteOptions {
    fn default() -> Self {
        Self {
            attempts_per_target: 5,
            inter_attempt_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Target URL to summary, kept in probe order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingResults(Vec<(String, TargetSummary)>);

impl PingResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the summary for `url`.
    pub fn insert(&mut self, url: impl Into<String>, summary: TargetSummary) {
        let url = url.into();
        match self.0.iter_mut().find(|(u, _)| *u == url) {
            Some(entry) => entry.1 = summary,
            None => self.0.push((url, summary)),
        }
    }

    pub fn get(&self, url: &str) -> Option<&TargetSummary> {
        self.0.iter().find(|(u, _)| u == url).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TargetSummary)> {
        self.0.iter().map(|(u, s)| (u.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Mean of the per-target means of every target that produced samples.
    pub fn overall_mean(&self) -> Option<f64> {
        let means: Vec<f64> = self.0.iter().filter_map(|(_, s)| s.mean()).collect();
        stats::mean(&means)
    }
}

impl Serialize for PingResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (url, summary) in &self.0 {
            map.serialize_entry(url, summary)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PingResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PingResultsVisitor;

        impl<'de> Visitor<'de> for PingResultsVisitor {
            type Value = PingResults;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of target URL to latency summary")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PingResults, A::Error> {
                let mut results = PingResults::new();
                while let Some((url, summary)) = access.next_entry::<String, TargetSummary>()? {
                    results.insert(url, summary);
                }
                Ok(results)
            }
        }

        deserializer.deserialize_map(PingResultsVisitor)
    }
}

/// Probe each target `attempts_per_target` times, strictly in sequence.
///
/// Failed attempts are dropped rather than recorded as zero. A target with
/// no successes gets the error marker; other targets are unaffected.
pub async fn run_latency_suite(
    sampler: &dyn Sampler,
    targets: &[String],
    opts: &LatencySuiteOptions,
) -> PingResults {
    let mut results = PingResults::new();

    for url in targets {
        info!(%url, attempts = opts.attempts_per_target, "Probing latency");
        let mut samples = Vec::with_capacity(opts.attempts_per_target as usize);

        for attempt in 0..opts.attempts_per_target {
            if attempt > 0 {
                tokio::time::sleep(opts.inter_attempt_delay).await;
            }

            match sampler.probe_latency(url, opts.timeout).await {
                Sample::Success { value, .. } => samples.push(value),
                Sample::Failure { error, .. } => {
                    warn!(%url, attempt = attempt + 1, %error, "latency attempt failed");
                    if !error.is_retryable() {
                        debug!(%url, "skipping remaining attempts");
                        break;
                    }
                }
            }
        }

        let summary = TargetSummary::from_samples(samples);
        match &summary {
            TargetSummary::Measured(s) => {
                info!(%url, avg_ms = s.mean, samples = s.count(), "Latency summary")
            }
            TargetSummary::Failed { error } => warn!(%url, %error, "No latency samples"),
        }
        results.insert(url.clone(), summary);
    }

    results
}

/// Download each target once, in list order, pausing between requests.
pub async fn run_download_suite(
    sampler: &dyn Sampler,
    targets: &[String],
    timeout: Duration,
    inter_request_delay: Duration,
) -> Vec<TransferResult> {
    let mut results = Vec::with_capacity(targets.len());

    for (i, url) in targets.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(inter_request_delay).await;
        }
        info!(%url, "Downloading test payload");
        results.push(sampler.probe_download(url, timeout).await);
    }

    results
}
