//! Tests for the probe endpoints.
//!
//! The health registry is process-global, so the test that flips component
//! state checks every transition inside a single test.

use axum::http::StatusCode;
use axum_test::TestServer;
use telemetry::{health, metrics};

fn server() -> TestServer {
    TestServer::new(api::router()).expect("Failed to create test server")
}

/// Test /health endpoint returns proper structure
#[tokio::test]
async fn test_health_endpoint_structure() {
    let response = server().get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    for field in ["status", "clickhouse_connected", "postgres_connected", "components"] {
        assert!(body.get(field).is_some(), "Response should have '{}' field", field);
    }

    let names: Vec<&str> = body["components"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, vec!["clickhouse", "postgres"]);
}

/// Test readiness follows both store components
#[tokio::test]
async fn test_readiness_requires_both_stores() {
    let server = server();

    health().clickhouse.set_healthy();
    health().postgres.set_healthy();
    server.get("/health/ready").await.assert_status_ok();
    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["status"], "healthy");

    health().postgres.set_unhealthy("Postgres connection failed");
    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["clickhouse_connected"], true);
    assert_eq!(body["postgres_connected"], false);

    health().clickhouse.set_unhealthy("ClickHouse connection failed");
    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["status"], "unhealthy");
}

/// Test /health/live endpoint always returns 200 when service is running
#[tokio::test]
async fn test_liveness_always_ok() {
    server().get("/health/live").await.assert_status_ok();
}

/// Test /metrics exposes the counter snapshot
#[tokio::test]
async fn test_metrics_snapshot_endpoint() {
    metrics().patterns_upserted.inc_by(3);

    let response = server().get("/metrics").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert!(body["patterns_upserted"].as_u64().unwrap() >= 3);
    assert!(body.get("metrics_runs").is_some());
    assert!(body.get("event_store_latency_mean_ms").is_some());
    assert!(body.get("timestamp").is_some());
}

/// Test unknown paths are not served
#[tokio::test]
async fn test_unknown_route_is_not_found() {
    server()
        .get("/ingest")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
