//! Store seams.
//!
//! Workers only see these traits. The ClickHouse and Postgres crates
//! implement them for production; tests use in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::events::{HttpEvent, HttpPathCount, UrlTemplate};
use crate::rollup::HttpMetricRow;
use crate::tenant::{App, Team};
use crate::watermark::{ProcessingWindow, Watermark, WatermarkKind};

/// Relational metadata: tenants, apps and watermarks.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn list_teams(&self) -> Result<Vec<Team>>;

    async fn list_apps(&self, team_id: Uuid) -> Result<Vec<App>>;

    /// Returns `None` when the app has never been processed.
    async fn get_watermark(&self, team_id: Uuid, app_id: Uuid) -> Result<Option<Watermark>>;

    /// Sets one aspect's watermark, creating the row if needed. The other
    /// aspect is left untouched.
    async fn upsert_watermark(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        kind: WatermarkKind,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Analytical event store: raw traffic, templates and rollups.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Request counts per distinct (domain, path) inserted in `window`.
    async fn fetch_path_counts(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        window: &ProcessingWindow,
    ) -> Result<Vec<HttpPathCount>>;

    /// Upserts templates keyed by (team, app, domain, path). Returns the
    /// number written.
    async fn upsert_url_patterns(&self, templates: &[UrlTemplate]) -> Result<usize>;

    async fn fetch_url_templates(&self, team_id: Uuid, app_id: Uuid) -> Result<Vec<UrlTemplate>>;

    /// Raw events inserted in `window` with non-zero status, non-empty
    /// domain and path, and latency at most `max_latency_ms`.
    async fn fetch_http_events(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        window: &ProcessingWindow,
        max_latency_ms: u64,
    ) -> Result<Vec<HttpEvent>>;

    /// Deletes rollup rows produced by windows ending after `from`.
    async fn delete_http_metrics(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<()>;

    async fn insert_http_metrics(&self, rows: &[HttpMetricRow]) -> Result<usize>;
}
