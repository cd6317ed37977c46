//! Read queries.
//!
//! Each query shape has its own row type. Timestamps are bound and read as
//! i64 milliseconds.

use crate::client::{observe, ClickHouseClient};
use chrono::{DateTime, Utc};
use clickhouse::Row;
use processor_core::{
    Error, HttpEvent, HttpMetricRow, HttpPathCount, LatencyDigest, MetricKey, ProcessingWindow,
    Result, UrlTemplate,
};
use serde::Deserialize;
use std::time::Instant;
use uuid::Uuid;

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| Error::events_query(format!("timestamp out of range: {}", ms)))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::events_query(format!("invalid id {}: {}", raw, e)))
}

// Aliases must not reuse a column name: ClickHouse resolves aliases before
// columns in WHERE.
const FETCH_URL_TEMPLATES: &str = "SELECT domain, path, \
     toUnixTimestamp64Milli(last_updated_at) AS last_updated_at_ms \
     FROM url_patterns FINAL \
     WHERE team_id = ? AND app_id = ? \
     ORDER BY domain, path";

const FETCH_HTTP_EVENTS: &str = "SELECT toUnixTimestamp64Milli(timestamp) AS timestamp_ms, \
     toUnixTimestamp64Milli(inserted_at) AS inserted_at_ms, \
     protocol, port, domain, path, method, status_code, latency_ms, \
     app_version, os_version, device_manufacturer, device_name, \
     network_provider, network_type, network_generation, device_locale \
     FROM http_events \
     WHERE team_id = ? AND app_id = ? \
     AND inserted_at >= fromUnixTimestamp64Milli(toInt64(?)) \
     AND inserted_at < fromUnixTimestamp64Milli(toInt64(?)) \
     AND latency_ms <= ? AND status_code != 0 \
     AND domain != '' AND path != ''";

/// Grouped request count per (domain, path).
#[derive(Debug, Clone, Row, Deserialize)]
pub struct PathCountRow {
    pub domain: String,
    pub path: String,
    pub count: u64,
}

/// Persisted template as read back.
#[derive(Debug, Clone, Row, Deserialize)]
pub struct TemplateRow {
    pub domain: String,
    pub path: String,
    #[serde(rename = "last_updated_at_ms")]
    pub last_updated_at: i64,
}

/// Raw event as selected for aggregation.
#[derive(Debug, Clone, Row, Deserialize)]
pub struct HttpEventRow {
    #[serde(rename = "timestamp_ms")]
    pub timestamp: i64,
    #[serde(rename = "inserted_at_ms")]
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

impl HttpEventRow {
    fn into_event(self, team_id: Uuid, app_id: Uuid) -> Result<HttpEvent> {
        Ok(HttpEvent {
            team_id,
            app_id,
            timestamp: from_millis(self.timestamp)?,
            inserted_at: from_millis(self.inserted_at)?,
            protocol: self.protocol,
            port: self.port,
            domain: self.domain,
            path: self.path,
            method: self.method,
            status_code: self.status_code,
            latency_ms: self.latency_ms,
            app_version: self.app_version,
            os_version: self.os_version,
            device_manufacturer: self.device_manufacturer,
            device_name: self.device_name,
            network_provider: self.network_provider,
            network_type: self.network_type,
            network_generation: self.network_generation,
            device_locale: self.device_locale,
        })
    }
}

/// Rollup row as stored in `http_metrics`.
#[derive(Debug, Clone, Row, serde::Serialize, Deserialize)]
pub struct MetricRow {
    pub team_id: String,
    pub app_id: String,
    pub timestamp: i64,
    pub protocol: String,
    pub port: u16,
    pub domain: String,
    pub path: String,
    pub method: String,
    pub status_code: u16,
    pub app_version: String,
    pub os_version: String,
    pub device_manufacturer: String,
    pub device_name: String,
    pub request_count: u64,
    pub count_2xx: u64,
    pub count_3xx: u64,
    pub count_4xx: u64,
    pub count_5xx: u64,
    pub network_providers: Vec<String>,
    pub network_types: Vec<String>,
    pub network_generations: Vec<String>,
    pub device_locales: Vec<String>,
    pub latency_digest: String,
    pub window_start: i64,
    pub window_end: i64,
}

impl TryFrom<&HttpMetricRow> for MetricRow {
    type Error = Error;

    fn try_from(row: &HttpMetricRow) -> Result<Self> {
        Ok(Self {
            team_id: row.team_id.to_string(),
            app_id: row.app_id.to_string(),
            timestamp: row.key.bucket_start.timestamp_millis(),
            protocol: row.key.protocol.clone(),
            port: row.key.port,
            domain: row.key.domain.clone(),
            path: row.key.path.clone(),
            method: row.key.method.clone(),
            status_code: row.key.status_code,
            app_version: row.key.app_version.clone(),
            os_version: row.key.os_version.clone(),
            device_manufacturer: row.key.device_manufacturer.clone(),
            device_name: row.key.device_name.clone(),
            request_count: row.request_count,
            count_2xx: row.count_2xx,
            count_3xx: row.count_3xx,
            count_4xx: row.count_4xx,
            count_5xx: row.count_5xx,
            network_providers: row.network_providers.clone(),
            network_types: row.network_types.clone(),
            network_generations: row.network_generations.clone(),
            device_locales: row.device_locales.clone(),
            latency_digest: row.latency.to_json()?,
            window_start: row.window_start.timestamp_millis(),
            window_end: row.window_end.timestamp_millis(),
        })
    }
}

impl TryFrom<MetricRow> for HttpMetricRow {
    type Error = Error;

    fn try_from(row: MetricRow) -> Result<Self> {
        Ok(Self {
            team_id: parse_id(&row.team_id)?,
            app_id: parse_id(&row.app_id)?,
            key: MetricKey {
                bucket_start: from_millis(row.timestamp)?,
                protocol: row.protocol,
                port: row.port,
                domain: row.domain,
                path: row.path,
                method: row.method,
                status_code: row.status_code,
                app_version: row.app_version,
                os_version: row.os_version,
                device_manufacturer: row.device_manufacturer,
                device_name: row.device_name,
            },
            request_count: row.request_count,
            count_2xx: row.count_2xx,
            count_3xx: row.count_3xx,
            count_4xx: row.count_4xx,
            count_5xx: row.count_5xx,
            network_providers: row.network_providers,
            network_types: row.network_types,
            network_generations: row.network_generations,
            device_locales: row.device_locales,
            window_start: from_millis(row.window_start)?,
            window_end: from_millis(row.window_end)?,
            latency: LatencyDigest::from_json(&row.latency_digest)?,
        })
    }
}

/// Request counts per distinct (domain, path) inserted in `window`.
pub async fn fetch_path_counts(
    client: &ClickHouseClient,
    team_id: Uuid,
    app_id: Uuid,
    window: &ProcessingWindow,
) -> Result<Vec<HttpPathCount>> {
    let started = Instant::now();
    let result = client
        .inner()
        .query(
            "SELECT domain, path, count() AS count FROM http_events \
             WHERE team_id = ? AND app_id = ? \
             AND inserted_at >= fromUnixTimestamp64Milli(toInt64(?)) \
             AND inserted_at < fromUnixTimestamp64Milli(toInt64(?)) \
             AND domain != '' AND path != '' \
             GROUP BY domain, path",
        )
        .bind(team_id.to_string())
        .bind(app_id.to_string())
        .bind(window.from.timestamp_millis())
        .bind(window.to.timestamp_millis())
        .fetch_all::<PathCountRow>()
        .await;
    let rows = observe(started, result, |e| {
        Error::events_query(format!("fetch path counts: {}", e))
    })?;

    Ok(rows
        .into_iter()
        .map(|r| HttpPathCount {
            team_id,
            app_id,
            domain: r.domain,
            path: r.path,
            count: r.count,
        })
        .collect())
}

/// Current templates for an app.
pub async fn fetch_url_templates(
    client: &ClickHouseClient,
    team_id: Uuid,
    app_id: Uuid,
) -> Result<Vec<UrlTemplate>> {
    let started = Instant::now();
    let result = client
        .inner()
        .query(FETCH_URL_TEMPLATES)
        .bind(team_id.to_string())
        .bind(app_id.to_string())
        .fetch_all::<TemplateRow>()
        .await;
    let rows = observe(started, result, |e| {
        Error::events_query(format!("fetch url templates: {}", e))
    })?;

    rows.into_iter()
        .map(|r| {
            Ok(UrlTemplate {
                team_id,
                app_id,
                domain: r.domain,
                path: r.path,
                last_updated_at: from_millis(r.last_updated_at)?,
            })
        })
        .collect()
}

/// Raw events eligible for aggregation in `window`.
pub async fn fetch_http_events(
    client: &ClickHouseClient,
    team_id: Uuid,
    app_id: Uuid,
    window: &ProcessingWindow,
    max_latency_ms: u64,
) -> Result<Vec<HttpEvent>> {
    let started = Instant::now();
    let result = client
        .inner()
        .query(FETCH_HTTP_EVENTS)
        .bind(team_id.to_string())
        .bind(app_id.to_string())
        .bind(window.from.timestamp_millis())
        .bind(window.to.timestamp_millis())
        .bind(max_latency_ms)
        .fetch_all::<HttpEventRow>()
        .await;
    let rows = observe(started, result, |e| {
        Error::events_query(format!("fetch http events: {}", e))
    })?;

    rows.into_iter()
        .map(|r| r.into_event(team_id, app_id))
        .collect()
}

/// All rollup rows for an app, ordered by bucket.
pub async fn fetch_http_metrics(
    client: &ClickHouseClient,
    team_id: Uuid,
    app_id: Uuid,
) -> Result<Vec<HttpMetricRow>> {
    let started = Instant::now();
    let result = client
        .inner()
        .query(
            "SELECT ?fields FROM http_metrics \
             WHERE team_id = ? AND app_id = ? \
             ORDER BY timestamp, domain, path, status_code",
        )
        .bind(team_id.to_string())
        .bind(app_id.to_string())
        .fetch_all::<MetricRow>()
        .await;
    let rows = observe(started, result, |e| {
        Error::events_query(format!("fetch http metrics: {}", e))
    })?;

    rows.into_iter().map(HttpMetricRow::try_from).collect()
}
