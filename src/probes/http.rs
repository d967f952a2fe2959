use super::{ProbeError, Sample, Sampler};
use crate::throughput::{TransferResult, TransferStats};
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("linkgauge/", env!("CARGO_PKG_VERSION"));

/// reqwest-backed sampler. One request in flight per call, each on a fresh
/// connection so connection setup is inside every measured interval.
#[derive(Clone)]
pub struct HttpSampler {
    client: Client,
}

impl HttpSampler {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(0)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (proxies, custom TLS roots).
    ///
    /// The client should be built with `pool_max_idle_per_host(0)`; a pooled
    /// client reuses warm connections and under-reports latency.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn download(&self, url: &str, timeout: Duration) -> Result<TransferStats, ProbeError> {
        let start = Instant::now();
        let mut response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, url, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                code: status.as_u16(),
            });
        }

        let mut total_bytes: u64 = 0;
        let mut last_byte_at = Instant::now();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify(e, url, timeout))?
        {
            // Stamp arrival before any bookkeeping.
            last_byte_at = Instant::now();
            total_bytes += chunk.len() as u64;
        }

        TransferStats::measure(total_bytes, last_byte_at.duration_since(start))
    }

    async fn upload(
        &self,
        url: &str,
        payload_size_bytes: usize,
        timeout: Duration,
    ) -> Result<TransferStats, ProbeError> {
        // Generated and form-encoded outside the timed interval.
        let payload = "x".repeat(payload_size_bytes);

        let request = self
            .client
            .post(url)
            .timeout(timeout)
            .form(&[("data", payload.as_str())])
            .build()
            .map_err(|e| classify(e, url, timeout))?;

        let start = Instant::now();
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| classify(e, url, timeout))?;
        let elapsed = start.elapsed();

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                code: status.as_u16(),
            });
        }

        TransferStats::measure(payload.len() as u64, elapsed)
    }
}

#[async_trait::async_trait]
impl Sampler for HttpSampler {
    async fn probe_latency(&self, url: &str, timeout: Duration) -> Sample {
        let start = Instant::now();
        let result = self.client.get(url).timeout(timeout).send().await;
        let elapsed = start.elapsed();

        let sample = match result {
            Ok(resp) if resp.status().is_success() => Sample::success(elapsed),
            Ok(resp) => Sample::Failure {
                error: ProbeError::Status {
                    code: resp.status().as_u16(),
                },
                elapsed,
            },
            Err(e) => Sample::Failure {
                error: classify(e, url, timeout),
                elapsed,
            },
        };

        match &sample {
            Sample::Success { value, .. } => debug!(%url, latency_ms = *value, "latency probe ok"),
            Sample::Failure { error, .. } => debug!(%url, %error, "latency probe failed"),
        }
        sample
    }

    async fn probe_download(&self, url: &str, timeout: Duration) -> TransferResult {
        let outcome = self.download(url, timeout).await;
        match &outcome {
            Ok(stats) => debug!(
                %url,
                bytes = stats.size_bytes,
                speed_mbps = stats.speed_mbps,
                "download probe ok"
            ),
            Err(error) => warn!(%url, %error, "download probe failed"),
        }
        outcome.into()
    }

    async fn probe_upload(
        &self,
        url: &str,
        payload_size_bytes: usize,
        timeout: Duration,
    ) -> TransferResult {
        let outcome = self.upload(url, payload_size_bytes, timeout).await;
        match &outcome {
            Ok(stats) => debug!(
                %url,
                bytes = stats.size_bytes,
                speed_mbps = stats.speed_mbps,
                "upload probe ok"
            ),
            Err(error) => warn!(%url, %error, "upload probe failed"),
        }
        outcome.into()
    }
}

/// Map a reqwest error onto the probe failure taxonomy.
fn classify(err: reqwest::Error, url: &str, timeout: Duration) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if err.is_builder() {
        ProbeError::InvalidTarget {
            url: url.to_string(),
            reason: error_chain(&err),
        }
    } else if err.is_connect() {
        ProbeError::Connect(error_chain(&err))
    } else if let Some(status) = err.status() {
        ProbeError::Status {
            code: status.as_u16(),
        }
    } else if err.is_body() || err.is_decode() {
        ProbeError::Body(error_chain(&err))
    } else {
        ProbeError::Transport(error_chain(&err))
    }
}

/// reqwest's top-level message is generic; the useful detail sits in the source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_url_is_invalid_target() {
        let sampler = HttpSampler::new().unwrap();
        let sample = sampler
            .probe_latency("not a url", Duration::from_secs(1))
            .await;
        match sample.error() {
            Some(ProbeError::InvalidTarget { url, .. }) => assert_eq!(url, "not a url"),
            other => panic!("expected invalid target, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_download_url_fails_as_data() {
        let sampler = HttpSampler::new().unwrap();
        let result = sampler
            .probe_download("::::", Duration::from_secs(1))
            .await;
        assert!(!result.is_success());
        assert!(result.error().unwrap().starts_with("invalid target"));
    }

    #[tokio::test]
    async fn test_malformed_upload_url_rejected_while_building() {
        let sampler = HttpSampler::new().unwrap();
        let result = sampler
            .upload("not a url", 1024, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(ProbeError::InvalidTarget { .. })));
    }
}
