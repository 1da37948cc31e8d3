//! End-to-end tests of the query API.
//!
//! Each test boots the real router on an ephemeral port with the in-memory
//! store, drives feed workers one iteration at a time with a scripted source,
//! and talks to the server over HTTP.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use floodpath_monitor::{
    config::PipelineSettings,
    error::AcquisitionError,
    health::HealthThresholds,
    query::QueryGateway,
    rate_limit::{RateLimitConfig, RateLimiter},
    registry::FeedRegistry,
    routes::{self, AppState},
    run_flag::RunFlag,
    source::SnapshotSource,
    store::MemoryStore,
    worker::{FeedWorker, IterationOutcome},
    Feed, Reading, Snapshot,
};

/// Hands out queued snapshots, then fails.
#[derive(Default)]
struct QueuedSource {
    queue: Mutex<VecDeque<Snapshot>>,
}

impl QueuedSource {
    fn push(&self, snapshot: Snapshot) {
        self.queue.lock().unwrap().push_back(snapshot);
    }
}

#[async_trait]
impl SnapshotSource for QueuedSource {
    async fn fetch(&self, _feed: Feed) -> Result<Snapshot, AcquisitionError> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AcquisitionError::Request("queue empty".into()))
    }

    fn name(&self) -> &'static str {
        "queued"
    }
}

struct TestServer {
    base: String,
    client: Client,
    registry: Arc<FeedRegistry>,
    store: Arc<MemoryStore>,
    source: Arc<QueuedSource>,
    run_flag: RunFlag,
}

impl TestServer {
    async fn start(rate_limit: RateLimitConfig) -> Result<Self> {
        // ---
        let registry = Arc::new(FeedRegistry::new());
        let store = Arc::new(MemoryStore::new());
        let run_flag = RunFlag::new();

        let state = AppState {
            registry: registry.clone(),
            query: QueryGateway::new(registry.clone(), store.clone(), false),
            limiter: Arc::new(RateLimiter::new(rate_limit)),
            run_flag: run_flag.clone(),
            health: HealthThresholds {
                stale_after: Duration::from_secs(600),
                poll_interval: Duration::from_secs(60),
            },
        };
        let app = routes::router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
        });

        Ok(Self {
            base: format!("http://{}", addr),
            client: Client::new(),
            registry,
            store,
            source: Arc::new(QueuedSource::default()),
            run_flag,
        })
    }

    fn worker(&self, feed: Feed) -> FeedWorker {
        FeedWorker::new(
            feed,
            self.registry.clone(),
            self.source.clone(),
            self.store.clone(),
            PipelineSettings {
                fetch_max_attempts: 1,
                ..PipelineSettings::default()
            },
            self.run_flag.clone(),
        )
    }

    async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        // ---
        let response = self.client.get(format!("{}{}", self.base, path)).send().await?;
        let status = response.status();
        Ok((status, response.json().await?))
    }
}

fn create_test_snapshot(hour: u32, minute: u32, levels: &[(&str, &str)]) -> Snapshot {
    // ---
    let captured_at = NaiveDate::from_ymd_opt(2024, 1, 5)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap();
    let readings = levels
        .iter()
        .map(|(station, level)| Reading::new(*station).with("current_wl", *level))
        .collect();
    Snapshot::new(readings, captured_at)
}

#[tokio::test]
async fn latest_is_unavailable_before_first_promotion() -> Result<()> {
    // ---
    let server = TestServer::start(RateLimitConfig::default()).await?;

    let (status, body) = server.get("/rainfall").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Rainfall data not available yet");
    assert!(body.get("error_details").is_none());

    let (status, body) = server.get("/water-level").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Water level data not available yet");

    Ok(())
}

#[tokio::test]
async fn unchanged_snapshot_is_not_promoted_and_change_is() -> Result<()> {
    // ---
    let server = TestServer::start(RateLimitConfig::default()).await?;
    let mut worker = server.worker(Feed::WaterLevel);

    // t0: snapshot A
    let a = create_test_snapshot(8, 0, &[("Sto Nino", "12.10"), ("Rosario", "13.40")]);
    server.source.push(a.clone());
    assert_eq!(worker.run_iteration().await, IterationOutcome::Promoted);
    assert_eq!(server.store.write_count(), 3);

    let (status, body) = server.get("/water-level").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["last_updated"], "2024-01-05 08:00");
    assert_eq!(body["data"][0]["station"], "Sto Nino");
    assert_eq!(body["data"][1]["current_wl"], "13.40");

    // t0+5min: same readings, newer page time
    let mut again = a.clone();
    again.captured_at = a.captured_at + chrono::Duration::minutes(5);
    server.source.push(again);
    assert_eq!(worker.run_iteration().await, IterationOutcome::Unchanged);
    assert_eq!(server.store.write_count(), 3);

    let (_, body) = server.get("/water-level").await?;
    assert_eq!(body["last_updated"], "2024-01-05 08:00");

    // t0+10min: one reading changed
    let b = create_test_snapshot(8, 10, &[("Sto Nino", "12.10"), ("Rosario", "13.55")]);
    server.source.push(b);
    assert_eq!(worker.run_iteration().await, IterationOutcome::Promoted);

    let (_, body) = server.get("/water-level").await?;
    assert_eq!(body["last_updated"], "2024-01-05 08:10");
    assert_eq!(body["data"][1]["current_wl"], "13.55");

    let (status, body) = server.get("/water-level?date=2024-01-05").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][1]["current_wl"], "13.55");

    let (status, body) = server.get("/water-level/dates").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dates"], serde_json::json!(["2024-01-05"]));

    // The other feed is untouched.
    let (status, _) = server.get("/rainfall").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    Ok(())
}

#[tokio::test]
async fn empty_table_is_a_failure_not_a_promotion() -> Result<()> {
    // ---
    let server = TestServer::start(RateLimitConfig::default()).await?;
    let mut worker = server.worker(Feed::Rainfall);

    server.source.push(create_test_snapshot(9, 0, &[]));
    assert_eq!(
        worker.run_iteration().await,
        IterationOutcome::Failed {
            consecutive_failures: 1
        }
    );
    assert_eq!(server.store.write_count(), 0);

    let (status, _) = server.get("/rainfall").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    Ok(())
}

#[tokio::test]
async fn bad_date_is_400_and_missing_date_is_404() -> Result<()> {
    // ---
    let server = TestServer::start(RateLimitConfig::default()).await?;

    let (status, body) = server.get("/water-level?date=2024-13-40").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid date format. Please use YYYY-MM-DD");

    let (status, body) = server.get("/rainfall?date=2024-01-01").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No data available for date 2024-01-01");

    Ok(())
}

#[tokio::test]
async fn malformed_query_string_gets_json_error() -> Result<()> {
    // ---
    let server = TestServer::start(RateLimitConfig::default()).await?;

    let (status, body) = server
        .get("/water-level?date=2024-01-05&date=2024-01-06")
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Invalid date format. Please use YYYY-MM-DD");

    let (status, body) = server.get("/api/v1/rainfall?date=1&date=2").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    Ok(())
}

#[tokio::test]
async fn rate_limit_rejects_the_101st_request() -> Result<()> {
    // ---
    let server = TestServer::start(RateLimitConfig::default()).await?;

    for i in 0..100 {
        let (status, _) = server.get("/rainfall/dates").await?;
        assert_eq!(status, StatusCode::OK, "request {} rejected", i + 1);
    }

    let response = server
        .client
        .get(format!("{}/api/v1/health", server.base))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.headers()["x-content-type-options"],
        "nosniff"
    );
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Rate limit exceeded. Please try again later.");

    Ok(())
}

#[tokio::test]
async fn hourly_limit_has_its_own_message() -> Result<()> {
    // ---
    let server = TestServer::start(RateLimitConfig {
        per_minute: 100,
        per_hour: 2,
        cleanup_interval: 100,
    })
    .await?;

    for _ in 0..2 {
        assert_eq!(server.get("/water-level/dates").await?.0, StatusCode::OK);
    }
    let (status, body) = server.get("/water-level/dates").await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["message"], "Hourly rate limit exceeded. Please try again later.");

    Ok(())
}

#[tokio::test]
async fn health_reflects_workers_and_run_flag() -> Result<()> {
    // ---
    let server = TestServer::start(RateLimitConfig::default()).await?;

    // No worker has ever run.
    let (status, body) = server.get("/health").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
    assert_eq!(body["water_worker_alive"], false);

    for feed in Feed::ALL {
        server.registry.worker_started(feed);
    }
    server.source.push(create_test_snapshot(7, 30, &[("Montalban", "21.3")]));
    server.worker(Feed::WaterLevel).run_iteration().await;

    let (status, body) = server.get("/api/v1/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["last_update"], "2024-01-05 07:30");
    assert_eq!(body["water_data_available"], true);
    assert_eq!(body["rainfall_data_available"], false);
    assert_eq!(body["water_worker_alive"], true);
    assert_eq!(body["rainfall_worker_alive"], true);

    server.run_flag.stop();
    let (status, body) = server.get("/health").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Scraping is not active");

    Ok(())
}

#[tokio::test]
async fn versioned_prefix_serves_the_same_routes() -> Result<()> {
    // ---
    let server = TestServer::start(RateLimitConfig::default()).await?;
    server.source.push(create_test_snapshot(6, 0, &[("Nangka", "17.2")]));
    server.worker(Feed::WaterLevel).run_iteration().await;

    let (plain_status, plain) = server.get("/water-level").await?;
    let (v1_status, v1) = server.get("/api/v1/water-level").await?;
    assert_eq!(plain_status, StatusCode::OK);
    assert_eq!(v1_status, StatusCode::OK);
    assert_eq!(plain["data"], v1["data"]);

    let (status, body) = server.get("/api/v1/water-level/dates").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dates"][0], "2024-01-05");

    Ok(())
}

#[tokio::test]
async fn every_response_carries_security_headers() -> Result<()> {
    // ---
    let server = TestServer::start(RateLimitConfig::default()).await?;
    let response = server
        .client
        .get(format!("{}/water-level", server.base))
        .send()
        .await?;

    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-xss-protection"], "1; mode=block");
    assert_eq!(
        headers["strict-transport-security"],
        "max-age=31536000; includeSubDomains"
    );
    assert_eq!(headers["content-security-policy"], "default-src 'self'");

    Ok(())
}
