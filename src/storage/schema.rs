//! Persisted run record and the derived overview shown to users.

use crate::analysis::{stats, PingResults};
use crate::throughput::TransferResult;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One completed full test cycle; the unit of persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    #[serde(with = "iso_timestamp")]
    pub timestamp: DateTime<Local>,
    pub ping: PingResults,
    pub download: Vec<TransferResult>,
    pub upload: TransferResult,
}

/// Headline numbers of a run. `None` where nothing succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RunOverview {
    pub avg_ping_ms: Option<f64>,
    pub avg_download_mbps: Option<f64>,
    pub max_download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
}

impl RunResult {
    pub fn new(ping: PingResults, download: Vec<TransferResult>, upload: TransferResult) -> Self {
        Self {
            timestamp: Local::now(),
            ping,
            download,
            upload,
        }
    }

    pub fn overview(&self) -> RunOverview {
        let speeds: Vec<f64> = self
            .download
            .iter()
            .filter_map(TransferResult::speed_mbps)
            .collect();
        RunOverview {
            avg_ping_ms: self.ping.overall_mean(),
            avg_download_mbps: stats::mean(&speeds),
            max_download_mbps: speeds.iter().copied().reduce(f64::max),
            upload_mbps: self.upload.speed_mbps(),
        }
    }
}

/// RFC 3339 on write; also accepts offset-less ISO-8601 (read as local time).
mod iso_timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Local>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Local>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(ts.with_timezone(&Local));
        }
        let naive = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| de::Error::custom(format!("invalid timestamp {:?}: {}", raw, e)))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| de::Error::custom(format!("nonexistent local time {:?}", raw)))
    }
}
