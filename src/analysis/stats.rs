use serde::{Deserialize, Serialize};

/// Error marker recorded for a target with no successful samples.
pub const ALL_ATTEMPTS_FAILED: &str = "all attempts failed";

/// Summary statistics over successful latency samples (ms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    #[serde(rename = "pings")]
    pub samples: Vec<f64>,
    #[serde(rename = "avg")]
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl LatencyStats {
    /// Summarize samples in the order they were taken.
    ///
    /// Returns `None` for an empty set; there is nothing to summarize.
    pub fn from_samples(samples: Vec<f64>) -> Option<Self> {
        let mean = mean(&samples)?;
        let median = median(&samples)?;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            samples,
            mean,
            min,
            max,
            median,
        })
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

/// Per-target aggregation. Numeric fields exist iff at least one sample succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSummary {
    Measured(LatencyStats),
    Failed { error: String },
}

impl TargetSummary {
    pub fn from_samples(samples: Vec<f64>) -> Self {
        match LatencyStats::from_samples(samples) {
            Some(stats) => TargetSummary::Measured(stats),
            None => TargetSummary::Failed {
                error: ALL_ATTEMPTS_FAILED.to_string(),
            },
        }
    }

    pub fn stats(&self) -> Option<&LatencyStats> {
        match self {
            TargetSummary::Measured(stats) => Some(stats),
            TargetSummary::Failed { .. } => None,
        }
    }

    pub fn mean(&self) -> Option<f64> {
        self.stats().map(|s| s.mean)
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median; an even count averages the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
