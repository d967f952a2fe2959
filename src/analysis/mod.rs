//! Aggregation, statistics and tier classification of probe results.

pub mod aggregator;
pub mod stats;
pub mod tiers;

pub use self::aggregator::{run_download_suite, run_latency_suite, LatencySuiteOptions, PingResults};
pub use self::stats::{LatencyStats, TargetSummary};
pub use self::tiers::{classify_download, classify_ping, classify_upload, Tier};
