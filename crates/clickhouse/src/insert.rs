//! Write paths: raw event replay, template upserts, rollup replacement and
//! internal metrics.

use crate::client::{observe, ClickHouseClient};
use crate::query::MetricRow;
use chrono::{DateTime, Utc};
use clickhouse::{Client, Row};
use processor_core::{Error, HttpEvent, HttpMetricRow, Result, UrlTemplate};
use serde::Serialize;
use std::time::Instant;
use telemetry::{metrics, MetricsSnapshot};
use tracing::debug;
use uuid::Uuid;

/// Template row for `url_patterns`.
#[derive(Debug, Clone, Row, Serialize)]
pub struct UrlPatternRow {
    pub team_id: String,
    pub app_id: String,
    pub domain: String,
    pub path: String,
    pub last_updated_at: i64,
}

impl From<&UrlTemplate> for UrlPatternRow {
    fn from(t: &UrlTemplate) -> Self {
        Self {
            team_id: t.team_id.to_string(),
            app_id: t.app_id.to_string(),
            domain: t.domain.clone(),
            path: t.path.clone(),
            last_updated_at: t.last_updated_at.timestamp_millis(),
        }
    }
}

/// Raw event row for `http_events`.
#[derive(Debug, Clone, Row, Serialize)]
pub struct HttpEventInsertRow {
    pub team_id: String,
    pub app_id: String,
    pub timestamp: i64,
    pub inserted_at: i64,
    pub protocol: String,
    pub port: u16,
    pub domain: String,
    pub path: String,
    pub method: String,
    pub status_code: u16,
    pub latency_ms: u64,
    pub app_version: String,
    pub os_version: String,
    pub device_manufacturer: String,
    pub device_name: String,
    pub network_provider: String,
    pub network_type: String,
    pub network_generation: String,
    pub device_locale: String,
}

impl From<&HttpEvent> for HttpEventInsertRow {
    fn from(e: &HttpEvent) -> Self {
        Self {
            team_id: e.team_id.to_string(),
            app_id: e.app_id.to_string(),
            timestamp: e.timestamp.timestamp_millis(),
            inserted_at: e.inserted_at.timestamp_millis(),
            protocol: e.protocol.clone(),
            port: e.port,
            domain: e.domain.clone(),
            path: e.path.clone(),
            method: e.method.clone(),
            status_code: e.status_code,
            latency_ms: e.latency_ms,
            app_version: e.app_version.clone(),
            os_version: e.os_version.clone(),
            device_manufacturer: e.device_manufacturer.clone(),
            device_name: e.device_name.clone(),
            network_provider: e.network_provider.clone(),
            network_type: e.network_type.clone(),
            network_generation: e.network_generation.clone(),
            device_locale: e.device_locale.clone(),
        }
    }
}

async fn write_rows<T: Row + Serialize>(client: &Client, table: &str, rows: &[T]) -> Result<()> {
    let started = Instant::now();
    let result = async {
        let mut insert = client.insert(table)?;
        for row in rows {
            insert.write(row).await?;
        }
        insert.end().await
    }
    .await;
    observe(started, result, |e| {
        Error::events_write(format!("insert into {}: {}", table, e))
    })?;
    metrics().event_store_writes.inc();
    Ok(())
}

/// Upserts templates. Newer `last_updated_at` wins on merge.
pub async fn upsert_url_patterns(
    client: &ClickHouseClient,
    templates: &[UrlTemplate],
) -> Result<usize> {
    if templates.is_empty() {
        return Ok(0);
    }

    let rows: Vec<UrlPatternRow> = templates.iter().map(UrlPatternRow::from).collect();
    write_rows(&client.upserts(), "url_patterns", &rows).await?;

    debug!(count = rows.len(), "Upserted url patterns");
    Ok(rows.len())
}

/// Replays raw events into `http_events`, keeping their `inserted_at`.
pub async fn insert_http_events(client: &ClickHouseClient, events: &[HttpEvent]) -> Result<usize> {
    if events.is_empty() {
        return Ok(0);
    }

    let rows: Vec<HttpEventInsertRow> = events.iter().map(HttpEventInsertRow::from).collect();
    write_rows(client.inner(), "http_events", &rows).await?;

    debug!(count = rows.len(), "Inserted http events");
    Ok(rows.len())
}

/// Deletes rollup rows produced by windows ending after `from`.
///
/// Acknowledged windows always end at or before the stored watermark, so only
/// rows from unacknowledged runs overlap a window starting at `from`.
///
/// Runs as a synchronous mutation so a following insert never races it.
pub async fn delete_http_metrics(
    client: &ClickHouseClient,
    team_id: Uuid,
    app_id: Uuid,
    from: DateTime<Utc>,
) -> Result<()> {
    let started = Instant::now();
    let result = client
        .mutations()
        .query(
            "ALTER TABLE http_metrics DELETE \
             WHERE team_id = ? AND app_id = ? \
             AND window_end > fromUnixTimestamp64Milli(toInt64(?))",
        )
        .bind(team_id.to_string())
        .bind(app_id.to_string())
        .bind(from.timestamp_millis())
        .execute()
        .await;
    observe(started, result, |e| {
        Error::events_write(format!("delete http metrics: {}", e))
    })?;

    debug!(%team_id, %app_id, %from, "Deleted unacknowledged http metrics");
    Ok(())
}

/// Inserts rollup rows.
pub async fn insert_http_metrics(client: &ClickHouseClient, rows: &[HttpMetricRow]) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    let stored = rows
        .iter()
        .map(MetricRow::try_from)
        .collect::<Result<Vec<_>>>()?;
    write_rows(client.inner(), "http_metrics", &stored).await?;

    debug!(count = stored.len(), "Inserted http metrics");
    Ok(stored.len())
}

/// Internal metrics row for ClickHouse.
#[derive(Debug, Clone, Row, Serialize)]
pub struct InternalMetricsRow {
    pub timestamp: i64,
    pub pattern_runs: u64,
    pub metrics_runs: u64,
    pub listing_failures: u64,
    pub teams_failed: u64,
    pub apps_processed: u64,
    pub apps_skipped: u64,
    pub apps_failed: u64,
    pub path_counts_read: u64,
    pub patterns_upserted: u64,
    pub events_aggregated: u64,
    pub events_dropped: u64,
    pub metric_rows_inserted: u64,
    pub event_store_writes: u64,
    pub event_store_errors: u64,
    pub metadata_store_errors: u64,
    pub pattern_run_latency_mean_ms: f64,
    pub metrics_run_latency_mean_ms: f64,
    pub event_store_latency_mean_ms: f64,
}

impl From<MetricsSnapshot> for InternalMetricsRow {
    fn from(s: MetricsSnapshot) -> Self {
        Self {
            timestamp: s.timestamp.timestamp_millis(),
            pattern_runs: s.pattern_runs,
            metrics_runs: s.metrics_runs,
            listing_failures: s.listing_failures,
            teams_failed: s.teams_failed,
            apps_processed: s.apps_processed,
            apps_skipped: s.apps_skipped,
            apps_failed: s.apps_failed,
            path_counts_read: s.path_counts_read,
            patterns_upserted: s.patterns_upserted,
            events_aggregated: s.events_aggregated,
            events_dropped: s.events_dropped,
            metric_rows_inserted: s.metric_rows_inserted,
            event_store_writes: s.event_store_writes,
            event_store_errors: s.event_store_errors,
            metadata_store_errors: s.metadata_store_errors,
            pattern_run_latency_mean_ms: s.pattern_run_latency_mean_ms,
            metrics_run_latency_mean_ms: s.metrics_run_latency_mean_ms,
            event_store_latency_mean_ms: s.event_store_latency_mean_ms,
        }
    }
}

/// Insert internal metrics snapshot.
pub async fn insert_internal_metrics(
    client: &ClickHouseClient,
    snapshot: MetricsSnapshot,
) -> Result<()> {
    let row = InternalMetricsRow::from(snapshot);
    write_rows(client.inner(), "internal_metrics", std::slice::from_ref(&row)).await
}
