//! Qualitative tiers for latency and throughput.
//!
//! Tier intervals are half-open on the lower bound: a value sitting exactly
//! on a threshold lands in the better tier.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Excellent,
    Good,
    Acceptable,
    Slow,
    Poor,
    VerySlow,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Excellent => "Excellent",
            Tier::Good => "Good",
            Tier::Acceptable => "Acceptable",
            Tier::Slow => "Slow",
            Tier::Poor => "Poor",
            Tier::VerySlow => "Very Slow",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Round-trip time in ms.
pub fn classify_ping(ms: f64) -> Tier {
    if ms < 20.0 {
        Tier::Excellent
    } else if ms < 50.0 {
        Tier::Good
    } else if ms < 100.0 {
        Tier::Acceptable
    } else {
        Tier::Poor
    }
}

pub fn classify_download(mbps: f64) -> Tier {
    if mbps >= 100.0 {
        Tier::Excellent
    } else if mbps >= 25.0 {
        Tier::Good
    } else if mbps >= 5.0 {
        Tier::Acceptable
    } else {
        Tier::Poor
    }
}

/// Upload has its own, lower scale and no Excellent tier.
pub fn classify_upload(mbps: f64) -> Tier {
    if mbps >= 10.0 {
        Tier::Good
    } else if mbps >= 5.0 {
        Tier::Acceptable
    } else if mbps >= 1.0 {
        Tier::Slow
    } else {
        Tier::VerySlow
    }
}
