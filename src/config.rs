//! TOML configuration for linkgauge.
//!
//! Every section falls back to compiled-in defaults, so a partial file (or
//! none at all) is valid. The file is looked up via `--config`, then the
//! `LINKGAUGE_CONFIG` environment variable, then `./linkgauge.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::LatencySuiteOptions;
use crate::probes::{ProbeRole, ProbeTarget};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "LINKGAUGE_CONFIG";

/// Looked up in the working directory when nothing else is given.
pub const LOCAL_CONFIG_FILE: &str = "linkgauge.toml";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("latency.attempts must be at least 1")]
    NoAttempts,

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("history.max_entries must be at least 1")]
    NoRetention,

    #[error("at least one {role} target is required")]
    NoTargets { role: ProbeRole },

    #[error("{role} target {url:?} is not an http(s) URL")]
    BadTarget { role: ProbeRole, url: String },
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub targets: TargetsConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve the config file. An explicitly requested file must load;
    /// otherwise fall back through the env var, the local file, then defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        Ok(Self::load_or_default())
    }

    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "LINKGAUGE_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.latency.attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        for (field, ms) in [
            ("latency.timeout_ms", self.latency.timeout_ms),
            ("transfer.timeout_ms", self.transfer.timeout_ms),
        ] {
            if ms == 0 {
                return Err(ConfigError::ZeroTimeout { field });
            }
        }
        if self.history.max_entries == 0 {
            return Err(ConfigError::NoRetention);
        }
        if self.targets.ping.is_empty() {
            return Err(ConfigError::NoTargets {
                role: ProbeRole::Ping,
            });
        }
        if self.targets.download.is_empty() {
            return Err(ConfigError::NoTargets {
                role: ProbeRole::Download,
            });
        }
        for target in self.targets.all() {
            if !(target.url.starts_with("http://") || target.url.starts_with("https://")) {
                return Err(ConfigError::BadTarget {
                    role: target.role,
                    url: target.url,
                });
            }
        }
        Ok(())
    }

    pub fn latency_options(&self) -> LatencySuiteOptions {
        LatencySuiteOptions {
            attempts_per_target: self.latency.attempts,
            inter_attempt_delay: Duration::from_millis(self.latency.inter_attempt_delay_ms),
            timeout: Duration::from_millis(self.latency.timeout_ms),
        }
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer.timeout_ms)
    }

    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.transfer.inter_request_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    /// Endpoints for latency probing.
    pub ping: Vec<String>,
    /// Byte-serving endpoints, probed in order (smallest first by convention).
    pub download: Vec<String>,
    /// Endpoint accepting a form POST.
    pub upload: String,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            ping: vec![
                "https://www.google.com".to_string(),
                "https://www.cloudflare.com".to_string(),
                "https://www.github.com".to_string(),
                "https://httpbin.org".to_string(),
            ],
            download: vec![
                "https://httpbin.org/bytes/1000000".to_string(),
                "https://httpbin.org/bytes/5000000".to_string(),
                "https://httpbin.org/bytes/10000000".to_string(),
            ],
            upload: "https://httpbin.org/post".to_string(),
        }
    }
}

impl TargetsConfig {
    /// Every configured endpoint tagged with its role.
    pub fn all(&self) -> Vec<ProbeTarget> {
        self.ping
            .iter()
            .map(|u| ProbeTarget::new(u.clone(), ProbeRole::Ping))
            .chain(
                self.download
                    .iter()
                    .map(|u| ProbeTarget::new(u.clone(), ProbeRole::Download)),
            )
            .chain(std::iter::once(ProbeTarget::new(
                self.upload.clone(),
                ProbeRole::Upload,
            )))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Latency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    pub attempts: u32,
    pub inter_attempt_delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            inter_attempt_delay_ms: 500,
            timeout_ms: 5_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub timeout_ms: u64,
    /// Pause between consecutive download targets.
    pub inter_request_delay_ms: u64,
    /// Upload payload in a full cycle.
    pub upload_size_bytes: usize,
    /// Upload payload for the upload-only cycle.
    pub quick_upload_size_bytes: usize,
    /// Download target used by the download-only cycle; clamped to the list.
    pub quick_download_index: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            inter_request_delay_ms: 1_000,
            upload_size_bytes: 1024 * 1024,
            quick_upload_size_bytes: 512 * 1024,
            quick_download_index: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: PathBuf,
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("speed_test_history.json"),
            max_entries: crate::storage::DEFAULT_MAX_ENTRIES,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
