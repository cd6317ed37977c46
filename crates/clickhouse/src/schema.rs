//! ClickHouse table schemas.
//!
//! - String team/app ids
//! - LowCardinality for enum-like fields
//! - DateTime64(3) for millisecond precision, read and written as i64 millis
//!
//! `{db}` is replaced with the configured database name.

/// Raw HTTP events captured by SDKs. Written by the ingest pipeline, read here.
pub const CREATE_HTTP_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.http_events (
    team_id String,
    app_id String,
    timestamp DateTime64(3, 'UTC'),
    inserted_at DateTime64(3, 'UTC') DEFAULT now64(3),

    protocol LowCardinality(String),
    port UInt16,
    domain String,
    path String,
    method LowCardinality(String),
    status_code UInt16,
    latency_ms UInt64,

    app_version LowCardinality(String),
    os_version LowCardinality(String),
    device_manufacturer LowCardinality(String),
    device_name LowCardinality(String),
    network_provider LowCardinality(String),
    network_type LowCardinality(String),
    network_generation LowCardinality(String),
    device_locale LowCardinality(String)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (team_id, app_id, inserted_at)
TTL toDateTime(timestamp) + INTERVAL 30 DAY
SETTINGS index_granularity = 8192
"#;

/// Discovered endpoint templates.
///
/// Replacing on `last_updated_at` makes a re-insert of the same
/// (team, app, domain, path) an upsert. Read with FINAL.
pub const CREATE_URL_PATTERNS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.url_patterns (
    team_id String,
    app_id String,
    domain String,
    path String,
    last_updated_at DateTime64(3, 'UTC')
)
ENGINE = ReplacingMergeTree(last_updated_at)
ORDER BY (team_id, app_id, domain, path)
SETTINGS index_granularity = 8192
"#;

/// Pre-aggregated metrics per template and bucket.
///
/// `window_start`/`window_end` record the run that produced a row so an
/// unacknowledged window can be deleted and recomputed.
pub const CREATE_HTTP_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.http_metrics (
    team_id String,
    app_id String,
    timestamp DateTime64(3, 'UTC'),

    protocol LowCardinality(String),
    port UInt16,
    domain String,
    path String,
    method LowCardinality(String),
    status_code UInt16,
    app_version LowCardinality(String),
    os_version LowCardinality(String),
    device_manufacturer LowCardinality(String),
    device_name LowCardinality(String),

    request_count UInt64,
    count_2xx UInt64,
    count_3xx UInt64,
    count_4xx UInt64,
    count_5xx UInt64,

    network_providers Array(String),
    network_types Array(String),
    network_generations Array(String),
    device_locales Array(String),

    latency_digest String,

    window_start DateTime64(3, 'UTC'),
    window_end DateTime64(3, 'UTC')
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (team_id, app_id, timestamp, domain, path)
TTL toDateTime(timestamp) + INTERVAL 90 DAY
SETTINGS index_granularity = 8192
"#;

/// SQL for creating the internal metrics table (dogfooding).
pub const CREATE_INTERNAL_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.internal_metrics (
    timestamp DateTime64(3, 'UTC'),
    pattern_runs UInt64,
    metrics_runs UInt64,
    listing_failures UInt64,
    teams_failed UInt64,
    apps_processed UInt64,
    apps_skipped UInt64,
    apps_failed UInt64,
    path_counts_read UInt64,
    patterns_upserted UInt64,
    events_aggregated UInt64,
    events_dropped UInt64,
    metric_rows_inserted UInt64,
    event_store_writes UInt64,
    event_store_errors UInt64,
    metadata_store_errors UInt64,
    pattern_run_latency_mean_ms Float64,
    metrics_run_latency_mean_ms Float64,
    event_store_latency_mean_ms Float64
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY timestamp
TTL toDateTime(timestamp) + INTERVAL 30 DAY
SETTINGS index_granularity = 8192
"#;

/// SQL for creating the database.
pub const CREATE_DATABASE: &str = "CREATE DATABASE IF NOT EXISTS {db}";

/// All table creation statements for `database`, database first.
pub fn all_tables(database: &str) -> Vec<String> {
    [
        CREATE_DATABASE,
        CREATE_HTTP_EVENTS_TABLE,
        CREATE_URL_PATTERNS_TABLE,
        CREATE_HTTP_METRICS_TABLE,
        CREATE_INTERNAL_METRICS_TABLE,
    ]
    .iter()
    .map(|ddl| ddl.replace("{db}", database))
    .collect()
}
