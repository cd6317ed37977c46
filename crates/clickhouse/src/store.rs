//! `EventStore` backed by ClickHouse.

use crate::client::ClickHouseClient;
use crate::{insert, query};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use processor_core::{
    EventStore, HttpEvent, HttpMetricRow, HttpPathCount, ProcessingWindow, Result, UrlTemplate,
};
use uuid::Uuid;

#[async_trait]
impl EventStore for ClickHouseClient {
    async fn fetch_path_counts(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        window: &ProcessingWindow,
    ) -> Result<Vec<HttpPathCount>> {
        query::fetch_path_counts(self, team_id, app_id, window).await
    }

    async fn upsert_url_patterns(&self, templates: &[UrlTemplate]) -> Result<usize> {
        insert::upsert_url_patterns(self, templates).await
    }

    async fn fetch_url_templates(&self, team_id: Uuid, app_id: Uuid) -> Result<Vec<UrlTemplate>> {
        query::fetch_url_templates(self, team_id, app_id).await
    }

    async fn fetch_http_events(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        window: &ProcessingWindow,
        max_latency_ms: u64,
    ) -> Result<Vec<HttpEvent>> {
        query::fetch_http_events(self, team_id, app_id, window, max_latency_ms).await
    }

    async fn delete_http_metrics(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<()> {
        insert::delete_http_metrics(self, team_id, app_id, from).await
    }

    async fn insert_http_metrics(&self, rows: &[HttpMetricRow]) -> Result<usize> {
        insert::insert_http_metrics(self, rows).await
    }
}
