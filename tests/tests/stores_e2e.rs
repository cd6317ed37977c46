//! End-to-end tests against real ClickHouse and Postgres.
//!
//! Requires Docker to be running for testcontainers, or set
//! `PROCESSOR_TEST_CLICKHOUSE_URL` and `PROCESSOR_TEST_DATABASE_URL`.

use chrono::{Duration, DurationRound, Utc};
use clickhouse_client::{insert::insert_http_events, query::fetch_http_metrics};
use integration_tests::containers::TestContainers;
use integration_tests::fixtures::{http_events, new_app};
use metadata_store::PgMetadataStore;
use processor_core::{App, EventStore, MetadataStore, ProcessorConfig, UrlTemplate, WatermarkKind};
use std::sync::Arc;
use worker::{MetricsWorker, Orchestrator, PatternWorker};

const DOMAIN: &str = "api.example.com";

async fn register(store: &PgMetadataStore, app: &App) {
    sqlx::query(&format!(
        "INSERT INTO {}.teams (id) VALUES ($1) ON CONFLICT DO NOTHING",
        store.config().schema
    ))
    .bind(app.team_id)
    .execute(store.pool())
    .await
    .expect("Failed to insert team");
    sqlx::query(&format!(
        "INSERT INTO {}.apps (id, team_id) VALUES ($1, $2)",
        store.config().schema
    ))
    .bind(app.id)
    .bind(app.team_id)
    .execute(store.pool())
    .await
    .expect("Failed to insert app");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_watermark_columns_are_independent() {
    let containers = TestContainers::start().await;
    let store = containers.postgres_store().await;
    metadata_store::health::init_schema(&store).await.unwrap();

    let app = new_app();
    register(&store, &app).await;
    assert!(store.get_watermark(app.team_id, app.id).await.unwrap().is_none());

    let patterns_at = Utc::now().duration_trunc(Duration::milliseconds(1)).unwrap();
    store
        .upsert_watermark(app.team_id, app.id, WatermarkKind::PatternGeneration, patterns_at)
        .await
        .unwrap();
    let metrics_at = patterns_at + Duration::minutes(15);
    store
        .upsert_watermark(app.team_id, app.id, WatermarkKind::MetricsReporting, metrics_at)
        .await
        .unwrap();

    let mark = store.get_watermark(app.team_id, app.id).await.unwrap().unwrap();
    assert_eq!(mark.pattern_generated_at, Some(patterns_at));
    assert_eq!(mark.metrics_reported_at, Some(metrics_at));

    let apps = store.list_apps(app.team_id).await.unwrap();
    assert_eq!(apps, vec![app]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_template_upsert_keeps_one_row_per_key() {
    let containers = TestContainers::start().await;
    let clickhouse = containers.clickhouse_client();
    clickhouse_client::health::init_schema(&clickhouse).await.unwrap();

    let app = new_app();
    let now = Utc::now().duration_trunc(Duration::milliseconds(1)).unwrap();
    let template = |at| UrlTemplate {
        team_id: app.team_id,
        app_id: app.id,
        domain: DOMAIN.to_string(),
        path: "/users/*".to_string(),
        last_updated_at: at,
    };

    clickhouse
        .upsert_url_patterns(&[template(now - Duration::hours(1))])
        .await
        .unwrap();
    clickhouse.upsert_url_patterns(&[template(now)]).await.unwrap();

    let stored = clickhouse.fetch_url_templates(app.team_id, app.id).await.unwrap();
    assert_eq!(stored, vec![template(now)]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_full_cycle_against_real_stores() {
    let containers = TestContainers::start().await;
    let clickhouse = Arc::new(containers.clickhouse_client());
    let postgres = Arc::new(containers.postgres_store().await);
    clickhouse_client::health::init_schema(&clickhouse).await.unwrap();
    metadata_store::health::init_schema(&postgres).await.unwrap();

    let app = new_app();
    register(&postgres, &app).await;

    let seen = Utc::now() - Duration::minutes(10);
    let mut events = Vec::new();
    for id in ["1001", "2002", "3003"] {
        events.extend(http_events(&app, DOMAIN, &format!("/orders/{id}"), seen, 4));
    }
    insert_http_events(&clickhouse, &events).await.unwrap();

    let config = ProcessorConfig {
        min_pattern_support: 5,
        ..ProcessorConfig::default()
    };
    let orchestrator = Orchestrator::new(postgres.clone());
    let patterns = PatternWorker::new(clickhouse.clone(), config.clone());
    let metrics = MetricsWorker::new(clickhouse.clone(), config);

    let report = orchestrator.run(&patterns, Utc::now()).await;
    assert_eq!(report.processed, 1);
    let templates = clickhouse.fetch_url_templates(app.team_id, app.id).await.unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].path, "/orders/*");

    let report = orchestrator.run(&metrics, Utc::now()).await;
    assert_eq!(report.processed, 1);
    let rows = fetch_http_metrics(&clickhouse, app.team_id, app.id).await.unwrap();
    let total: u64 = rows.iter().map(|r| r.request_count).sum();
    assert_eq!(total, 12);
    assert!(rows.iter().all(|r| r.key.path == "/orders/*"));
    assert_eq!(rows.iter().map(|r| r.latency.count()).sum::<u64>(), 12);

    let mark = postgres.get_watermark(app.team_id, app.id).await.unwrap().unwrap();
    assert!(mark.pattern_generated_at.is_some());
    assert!(mark.metrics_reported_at.is_some());
}
