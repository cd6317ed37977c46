//! Windowed metric rollups keyed by endpoint template.
//!
//! Raw events are attributed to a template, bucketed by time and grouped by
//! the fan-out dimensions. Multi-valued network and locale attributes are
//! collected as distinct sets instead of widening the key.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::HttpEvent;
use crate::matcher::TemplateMatcher;
use crate::sketch::{LatencyDigest, Percentiles};
use crate::tenant::App;
use crate::watermark::ProcessingWindow;

/// Grouping key of one rollup row within an app.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    pub bucket_start: DateTime<Utc>,
    pub protocol: String,
    pub port: u16,
    pub domain: String,
    /// Matched template path
    pub path: String,
    pub method: String,
    pub status_code: u16,
    pub app_version: String,
    pub os_version: String,
    pub device_manufacturer: String,
    pub device_name: String,
}

/// One aggregated metric row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpMetricRow {
    pub team_id: Uuid,
    pub app_id: Uuid,
    pub key: MetricKey,
    pub request_count: u64,
    pub count_2xx: u64,
    pub count_3xx: u64,
    pub count_4xx: u64,
    pub count_5xx: u64,
    pub network_providers: Vec<String>,
    pub network_types: Vec<String>,
    pub network_generations: Vec<String>,
    pub device_locales: Vec<String>,
    /// Bounds of the processing window that produced this row.
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub latency: LatencyDigest,
}

/// Floors `ts` to the start of its bucket.
pub fn bucket_start(ts: DateTime<Utc>, bucket: Duration) -> DateTime<Utc> {
    let width = bucket.num_seconds().max(1);
    let secs = ts.timestamp();
    let floored = secs - secs.rem_euclid(width);
    DateTime::from_timestamp(floored, 0).unwrap_or(ts)
}

/// True when an event qualifies for aggregation in `window`.
pub fn is_aggregatable(event: &HttpEvent, window: &ProcessingWindow, max_latency_ms: u64) -> bool {
    window.contains(event.inserted_at)
        && event.latency_ms <= max_latency_ms
        && event.status_code != 0
        && !event.domain.is_empty()
        && !event.path.is_empty()
}

#[derive(Default)]
struct Accumulator {
    request_count: u64,
    count_2xx: u64,
    count_3xx: u64,
    count_4xx: u64,
    count_5xx: u64,
    network_providers: BTreeSet<String>,
    network_types: BTreeSet<String>,
    network_generations: BTreeSet<String>,
    device_locales: BTreeSet<String>,
    latency: LatencyDigest,
}

impl Accumulator {
    fn add(&mut self, event: &HttpEvent) {
        self.request_count += 1;
        match event.status_code {
            200..=299 => self.count_2xx += 1,
            300..=399 => self.count_3xx += 1,
            400..=499 => self.count_4xx += 1,
            500..=599 => self.count_5xx += 1,
            _ => {}
        }
        insert_non_empty(&mut self.network_providers, &event.network_provider);
        insert_non_empty(&mut self.network_types, &event.network_type);
        insert_non_empty(&mut self.network_generations, &event.network_generation);
        insert_non_empty(&mut self.device_locales, &event.device_locale);
        self.latency.add(event.latency_ms as f64);
    }
}

fn insert_non_empty(set: &mut BTreeSet<String>, value: &str) {
    if !value.is_empty() && !set.contains(value) {
        set.insert(value.to_string());
    }
}

/// Result of aggregating one window for one app.
#[derive(Debug, Clone, Default)]
pub struct Rollup {
    /// Rows sorted by key.
    pub rows: Vec<HttpMetricRow>,
    pub matched_events: u64,
    /// Events that matched no template or fell outside the filters.
    pub dropped_events: u64,
}

/// Groups `events` into rollup rows for `app` over `window`.
pub fn aggregate_events(
    app: &App,
    events: &[HttpEvent],
    matcher: &TemplateMatcher,
    window: &ProcessingWindow,
    bucket: Duration,
    max_latency_ms: u64,
) -> Rollup {
    let mut groups: BTreeMap<MetricKey, Accumulator> = BTreeMap::new();
    let mut matched_events = 0;
    let mut dropped_events = 0;

    for event in events {
        if !is_aggregatable(event, window, max_latency_ms) {
            dropped_events += 1;
            continue;
        }
        let Some(template) = matcher.match_path(&event.domain, &event.path) else {
            dropped_events += 1;
            continue;
        };
        matched_events += 1;

        let key = MetricKey {
            bucket_start: bucket_start(event.timestamp, bucket),
            protocol: event.protocol.clone(),
            port: event.port,
            domain: event.domain.clone(),
            path: template.to_string(),
            method: event.method.clone(),
            status_code: event.status_code,
            app_version: event.app_version.clone(),
            os_version: event.os_version.clone(),
            device_manufacturer: event.device_manufacturer.clone(),
            device_name: event.device_name.clone(),
        };
        groups.entry(key).or_default().add(event);
    }

    let rows = groups
        .into_iter()
        .map(|(key, mut acc)| {
            acc.latency.flush();
            HttpMetricRow {
                team_id: app.team_id,
                app_id: app.id,
                key,
                request_count: acc.request_count,
                count_2xx: acc.count_2xx,
                count_3xx: acc.count_3xx,
                count_4xx: acc.count_4xx,
                count_5xx: acc.count_5xx,
                network_providers: acc.network_providers.into_iter().collect(),
                network_types: acc.network_types.into_iter().collect(),
                network_generations: acc.network_generations.into_iter().collect(),
                device_locales: acc.device_locales.into_iter().collect(),
                window_start: window.from,
                window_end: window.to,
                latency: acc.latency,
            }
        })
        .collect();

    Rollup {
        rows,
        matched_events,
        dropped_events,
    }
}

/// Latency and status summary across several rollup rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub request_count: u64,
    pub error_rate: f64,
    pub percentiles: Percentiles,
}

impl LatencySummary {
    /// Merges the digests of `rows`. Returns `None` when the rows carry no
    /// latency samples.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a HttpMetricRow>) -> Option<Self> {
        let mut digest = LatencyDigest::default();
        let mut request_count = 0;
        let mut errors = 0;
        for row in rows {
            digest.merge(&row.latency);
            request_count += row.request_count;
            errors += row.count_4xx + row.count_5xx;
        }
        let percentiles = digest.percentiles().ok()?;
        let error_rate = if request_count == 0 {
            0.0
        } else {
            errors as f64 / request_count as f64
        };
        Some(Self {
            request_count,
            error_rate,
            percentiles,
        })
    }
}
