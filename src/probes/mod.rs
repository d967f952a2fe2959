//! Timed network probes: latency, bulk download and bulk upload.
//!
//! A probe never raises to its caller. Transport problems are classified
//! into a [`ProbeError`] and returned as data so the aggregation layer can
//! decide what to do with a partial failure.

pub mod http;
#[cfg(test)]
pub(crate) mod scripted;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::throughput::TransferResult;

pub use self::http::HttpSampler;

/// What a target is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeRole {
    Ping,
    Download,
    Upload,
}

impl std::fmt::Display for ProbeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeRole::Ping => write!(f, "ping"),
            ProbeRole::Download => write!(f, "download"),
            ProbeRole::Upload => write!(f, "upload"),
        }
    }
}

/// An endpoint plus the role it plays in a test cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub url: String,
    pub role: ProbeRole,
}

impl ProbeTarget {
    pub fn new(url: impl Into<String>, role: ProbeRole) -> Self {
        Self {
            url: url.into(),
            role,
        }
    }
}

/// Classified reason a probe did not produce a measurement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {code}")]
    Status { code: u16 },

    #[error("response body error: {0}")]
    Body(String),

    #[error("invalid target {url}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transfer completed too fast to measure")]
    TooFast,
}

impl ProbeError {
    /// Whether repeating the same probe could plausibly give a different outcome.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProbeError::InvalidTarget { .. })
    }
}

/// Raw outcome of one latency probe attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// `value` is the round-trip time in milliseconds.
    Success { value: f64, elapsed: Duration },
    Failure { error: ProbeError, elapsed: Duration },
}

impl Sample {
    pub fn success(elapsed: Duration) -> Self {
        Sample::Success {
            value: elapsed.as_secs_f64() * 1000.0,
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Sample::Success { .. })
    }

    /// Latency in ms for successful samples.
    pub fn value(&self) -> Option<f64> {
        match self {
            Sample::Success { value, .. } => Some(*value),
            Sample::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ProbeError> {
        match self {
            Sample::Success { .. } => None,
            Sample::Failure { error, .. } => Some(error),
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Sample::Success { elapsed, .. } | Sample::Failure { elapsed, .. } => *elapsed,
        }
    }
}

/// One timed network operation per call, every call bounded by `timeout`.
///
/// Implementations must capture all failures as data.
#[async_trait::async_trait]
pub trait Sampler: Send + Sync {
    /// Time from request start until response headers arrive.
    async fn probe_latency(&self, url: &str, timeout: Duration) -> Sample;

    /// Stream a full response body and time it to the last byte.
    async fn probe_download(&self, url: &str, timeout: Duration) -> TransferResult;

    /// POST a filler payload of exactly `payload_size_bytes` as form data.
    async fn probe_upload(
        &self,
        url: &str,
        payload_size_bytes: usize,
        timeout: Duration,
    ) -> TransferResult;
}
