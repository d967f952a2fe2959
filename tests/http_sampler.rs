//! HttpSampler and TestRunner against a local axum fixture server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use linkgauge::analysis::{run_download_suite, run_latency_suite, LatencySuiteOptions};
use linkgauge::config::Config;
use linkgauge::probes::{HttpSampler, ProbeError, Sampler};
use linkgauge::runner::TestRunner;
use linkgauge::storage::{HistoryRepository, JsonHistoryStore};

async fn spawn_fixture() -> String {
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route(
            "/bytes/{n}",
            get(|Path(n): Path<usize>| async move { vec![b'z'; n] }),
        )
        .route(
            "/post",
            post(|body: Bytes| async move { body.len().to_string() }),
        )
        .route(
            "/status/{code}",
            get(|Path(code): Path<u16>| async move {
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .layer(DefaultBodyLimit::disable());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Keep-alive HTTP/1.1 server that counts accepted connections.
async fn spawn_keepalive_fixture() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let counter = accepts.clone();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut pending = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    pending.extend_from_slice(&buf[..n]);
                    while let Some(end) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
                        pending.drain(..end + 4);
                        let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: keep-alive\r\n\r\nok";
                        if socket.write_all(reply).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    (format!("http://{}", addr), accepts)
}

#[tokio::test]
async fn test_every_probe_opens_its_own_connection() {
    let (base, accepts) = spawn_keepalive_fixture().await;
    let sampler = HttpSampler::new().unwrap();
    let target = format!("{}/", base);

    let opts = LatencySuiteOptions {
        attempts_per_target: 5,
        inter_attempt_delay: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    };
    let results = run_latency_suite(&sampler, &[target.clone()], &opts).await;
    assert_eq!(
        results.get(&target).and_then(|s| s.stats()).map(|s| s.count()),
        Some(5)
    );
    assert_eq!(accepts.load(Ordering::SeqCst), 5);

    let downloads = run_download_suite(
        &sampler,
        &[target.clone(), target.clone()],
        Duration::from_secs(5),
        Duration::from_millis(10),
    )
    .await;
    assert!(downloads.iter().all(|d| d.is_success()));
    assert_eq!(accepts.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn test_latency_probe_success() {
    let base = spawn_fixture().await;
    let sampler = HttpSampler::new().unwrap();

    let sample = sampler
        .probe_latency(&format!("{}/", base), Duration::from_secs(5))
        .await;

    assert!(sample.is_success(), "{:?}", sample);
    let ms = sample.value().unwrap();
    assert!(ms >= 0.0 && ms < 5_000.0);
}

#[tokio::test]
async fn test_latency_probe_error_status_is_failure() {
    let base = spawn_fixture().await;
    let sampler = HttpSampler::new().unwrap();

    let sample = sampler
        .probe_latency(&format!("{}/status/503", base), Duration::from_secs(5))
        .await;

    assert_eq!(sample.error(), Some(&ProbeError::Status { code: 503 }));
}

#[tokio::test]
async fn test_latency_probe_timeout() {
    let base = spawn_fixture().await;
    let sampler = HttpSampler::new().unwrap();

    let sample = sampler
        .probe_latency(&format!("{}/slow", base), Duration::from_millis(200))
        .await;

    assert_eq!(sample.error(), Some(&ProbeError::Timeout { timeout_ms: 200 }));
    assert!(sample.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_connection_refused_is_connect_error() {
    // Grab a free port, then close it.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sampler = HttpSampler::new().unwrap();
    let sample = sampler
        .probe_latency(&format!("http://{}/", addr), Duration::from_secs(2))
        .await;

    assert!(
        matches!(sample.error(), Some(ProbeError::Connect(_))),
        "{:?}",
        sample
    );
}

#[tokio::test]
async fn test_download_counts_every_byte() {
    let base = spawn_fixture().await;
    let sampler = HttpSampler::new().unwrap();

    let result = sampler
        .probe_download(&format!("{}/bytes/1000000", base), Duration::from_secs(30))
        .await;

    let stats = result.stats().expect("download should succeed");
    assert_eq!(stats.size_bytes, 1_000_000);
    assert!(stats.time_seconds > 0.0);
    let expected = (stats.size_bytes as f64 * 8.0) / (stats.time_seconds * 1_000_000.0);
    assert!((stats.speed_mbps - expected).abs() < 1e-6);
}

#[tokio::test]
async fn test_download_error_status_is_failure() {
    let base = spawn_fixture().await;
    let sampler = HttpSampler::new().unwrap();

    let result = sampler
        .probe_download(&format!("{}/status/404", base), Duration::from_secs(5))
        .await;

    assert_eq!(result.error(), Some("HTTP status 404"));
}

#[tokio::test]
async fn test_upload_reports_payload_size() {
    let base = spawn_fixture().await;
    let sampler = HttpSampler::new().unwrap();

    let result = sampler
        .probe_upload(&format!("{}/post", base), 524_288, Duration::from_secs(30))
        .await;

    let stats = result.stats().expect("upload should succeed");
    assert_eq!(stats.size_bytes, 524_288);
    assert!((stats.size_mb() - 0.5).abs() < 1e-9);
    assert!(stats.speed_mbps > 0.0);
}

#[tokio::test]
async fn test_full_cycle_writes_history_file() {
    let base = spawn_fixture().await;
    let dir = tempfile::TempDir::new().unwrap();
    let history_path = dir.path().join("history.json");

    let mut config = Config::default();
    config.targets.ping = vec![format!("{}/", base), format!("{}/status/500", base)];
    config.targets.download = vec![
        format!("{}/bytes/100000", base),
        format!("{}/bytes/200000", base),
    ];
    config.targets.upload = format!("{}/post", base);
    config.latency.attempts = 2;
    config.latency.inter_attempt_delay_ms = 10;
    config.transfer.inter_request_delay_ms = 10;
    config.transfer.upload_size_bytes = 64 * 1024;

    let store = Arc::new(JsonHistoryStore::new(&history_path, 50));
    let runner = TestRunner::new(Arc::new(HttpSampler::new().unwrap()), store.clone(), config);

    let report = runner.run_full().await;

    assert!(report.persisted());
    let result = &report.result;
    assert_eq!(result.ping.len(), 2);
    assert_eq!(
        result
            .ping
            .get(&format!("{}/", base))
            .and_then(|s| s.stats())
            .map(|s| s.count()),
        Some(2)
    );
    assert!(result
        .ping
        .get(&format!("{}/status/500", base))
        .unwrap()
        .stats()
        .is_none());
    assert!(result.download.iter().all(|d| d.is_success()));
    assert_eq!(result.upload.stats().map(|s| s.size_bytes), Some(64 * 1024));

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&history_path).unwrap()).unwrap();
    assert_eq!(raw.as_array().map(|a| a.len()), Some(1));
    assert_eq!(store.load(10).unwrap().len(), 1);
}
