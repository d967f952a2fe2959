//! Human-readable transfer summaries.

use super::TransferResult;

/// Format a speed, switching to Gbps above 1000 Mbps.
pub fn format_speed(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.2} Gbps", mbps / 1000.0)
    } else {
        format!("{:.2} Mbps", mbps)
    }
}

/// One-line summary of a transfer, e.g. `download: 84.31 Mbps (5.0 MB in 0.5s)`.
pub fn format_summary(direction: &str, result: &TransferResult) -> String {
    match result {
        TransferResult::Completed(stats) => format!(
            "{}: {} ({:.1} MB in {:.1}s)",
            direction,
            format_speed(stats.speed_mbps),
            stats.size_mb(),
            stats.time_seconds,
        ),
        TransferResult::Failed { error } => format!("{}: failed ({})", direction, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throughput::TransferStats;

    #[test]
    fn test_format_summary_gbps() {
        let result = TransferResult::Completed(TransferStats {
            speed_mbps: 9412.0,
            size_bytes: 10_485_760,
            time_seconds: 0.0089,
        });
        let summary = format_summary("download", &result);
        assert!(summary.contains("9.41 Gbps"));
        assert!(summary.contains("10.0 MB"));
    }

    #[test]
    fn test_format_summary_mbps() {
        let result = TransferResult::Completed(TransferStats {
            speed_mbps: 245.3,
            size_bytes: 524_288,
            time_seconds: 2.0,
        });
        let summary = format_summary("upload", &result);
        assert_eq!(summary, "upload: 245.30 Mbps (0.5 MB in 2.0s)");
    }

    #[test]
    fn test_format_summary_failure() {
        let result = TransferResult::Failed {
            error: "connection failed: refused".to_string(),
        };
        assert_eq!(
            format_summary("download", &result),
            "download: failed (connection failed: refused)"
        );
    }
}
