//! Internal metrics collection.
//!
//! Counters live in memory and are periodically flushed to the event store's
//! `internal_metrics` table, and served on `GET /metrics`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric holding the latest value.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 25ms, 100ms, 250ms, 1s, 5s, 30s, 60s, 5m, 15m
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [
        1, 5, 25, 100, 250, 1_000, 5_000, 30_000, 60_000, 300_000, 900_000,
    ];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper_bound_ms, count)` per bucket.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the processor.
#[derive(Debug, Default)]
pub struct Metrics {
    // Orchestrator runs
    pub pattern_runs: Counter,
    pub metrics_runs: Counter,
    pub listing_failures: Counter,
    pub teams_failed: Counter,

    // Per-app outcomes
    pub apps_processed: Counter,
    pub apps_skipped: Counter,
    pub apps_failed: Counter,

    // Pattern discovery
    pub path_counts_read: Counter,
    pub patterns_upserted: Counter,

    // Metrics aggregation
    pub events_aggregated: Counter,
    pub events_dropped: Counter,
    pub metric_rows_inserted: Counter,

    // Stores
    pub event_store_writes: Counter,
    pub event_store_errors: Counter,
    pub metadata_store_errors: Counter,

    // Latency histograms
    pub pattern_run_latency_ms: Histogram,
    pub metrics_run_latency_ms: Histogram,
    pub event_store_latency_ms: Histogram,

    // Gauges (unix seconds)
    pub last_pattern_run_at: Gauge,
    pub last_metrics_run_at: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
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
    pub last_pattern_run_at: u64,
    pub last_metrics_run_at: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            pattern_runs: self.pattern_runs.get(),
            metrics_runs: self.metrics_runs.get(),
            listing_failures: self.listing_failures.get(),
            teams_failed: self.teams_failed.get(),
            apps_processed: self.apps_processed.get(),
            apps_skipped: self.apps_skipped.get(),
            apps_failed: self.apps_failed.get(),
            path_counts_read: self.path_counts_read.get(),
            patterns_upserted: self.patterns_upserted.get(),
            events_aggregated: self.events_aggregated.get(),
            events_dropped: self.events_dropped.get(),
            metric_rows_inserted: self.metric_rows_inserted.get(),
            event_store_writes: self.event_store_writes.get(),
            event_store_errors: self.event_store_errors.get(),
            metadata_store_errors: self.metadata_store_errors.get(),
            pattern_run_latency_mean_ms: self.pattern_run_latency_ms.mean(),
            metrics_run_latency_mean_ms: self.metrics_run_latency_ms.mean(),
            event_store_latency_mean_ms: self.event_store_latency_ms.mean(),
            last_pattern_run_at: self.last_pattern_run_at.get(),
            last_metrics_run_at: self.last_metrics_run_at.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
