//! Bulk transfer results: download and upload speed measurements.

pub mod report;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probes::ProbeError;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Megabits per second for `bytes` moved in `elapsed`.
///
/// Returns `None` when no measurable time has passed.
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some((bytes as f64 * 8.0) / (secs * 1_000_000.0))
}

/// Metrics of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferStats {
    pub speed_mbps: f64,
    pub size_bytes: u64,
    pub time_seconds: f64,
}

impl TransferStats {
    pub fn measure(size_bytes: u64, elapsed: Duration) -> Result<Self, ProbeError> {
        let speed_mbps = throughput_mbps(size_bytes, elapsed).ok_or(ProbeError::TooFast)?;
        Ok(Self {
            speed_mbps,
            size_bytes,
            time_seconds: elapsed.as_secs_f64(),
        })
    }

    /// Transfer size in MiB.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MIB
    }
}

/// Outcome of one download or upload probe.
///
/// Persists as a flat object whose fields depend on `success`:
/// `{"success":true,"speed_mbps","size_bytes","time_seconds","size_mb"}` or
/// `{"success":false,"error","speed_mbps":0,"size_bytes":0,"time_seconds":0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "TransferRecord", try_from = "TransferRecord")]
pub enum TransferResult {
    Completed(TransferStats),
    Failed { error: String },
}

impl TransferResult {
    pub fn failed(error: &ProbeError) -> Self {
        TransferResult::Failed {
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransferResult::Completed(_))
    }

    pub fn stats(&self) -> Option<&TransferStats> {
        match self {
            TransferResult::Completed(stats) => Some(stats),
            TransferResult::Failed { .. } => None,
        }
    }

    pub fn speed_mbps(&self) -> Option<f64> {
        self.stats().map(|s| s.speed_mbps)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TransferResult::Completed(_) => None,
            TransferResult::Failed { error } => Some(error),
        }
    }
}

impl From<Result<TransferStats, ProbeError>> for TransferResult {
    fn from(outcome: Result<TransferStats, ProbeError>) -> Self {
        match outcome {
            Ok(stats) => TransferResult::Completed(stats),
            Err(e) => TransferResult::failed(&e),
        }
    }
}

/// On-disk shape of a [`TransferResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TransferRecord {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default)]
    speed_mbps: f64,
    #[serde(default)]
    size_bytes: u64,
    #[serde(default)]
    time_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size_mb: Option<f64>,
}

impl From<TransferResult> for TransferRecord {
    fn from(result: TransferResult) -> Self {
        match result {
            TransferResult::Completed(stats) => TransferRecord {
                success: true,
                error: None,
                speed_mbps: stats.speed_mbps,
                size_bytes: stats.size_bytes,
                time_seconds: stats.time_seconds,
                size_mb: Some(stats.size_mb()),
            },
            TransferResult::Failed { error } => TransferRecord {
                success: false,
                error: Some(error),
                speed_mbps: 0.0,
                size_bytes: 0,
                time_seconds: 0.0,
                size_mb: None,
            },
        }
    }
}

impl TryFrom<TransferRecord> for TransferResult {
    type Error = String;

    fn try_from(record: TransferRecord) -> Result<Self, Self::Error> {
        if !record.success {
            return Ok(TransferResult::Failed {
                error: record.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        if !record.speed_mbps.is_finite() || record.speed_mbps < 0.0 {
            return Err(format!("invalid speed_mbps {}", record.speed_mbps));
        }
        Ok(TransferResult::Completed(TransferStats {
            speed_mbps: record.speed_mbps,
            size_bytes: record.size_bytes,
            time_seconds: record.time_seconds,
        }))
    }
}
