//! Metrics aggregation job.
//!
//! For one app and window: clear rows a previous unacknowledged run may have
//! left behind, match raw events against the app's templates and write one
//! row per (bucket, dimensions) group.

use async_trait::async_trait;
use chrono::Duration;
use processor_core::rollup::aggregate_events;
use processor_core::{
    App, EventStore, ProcessingWindow, ProcessorConfig, Result, TemplateMatcher, WatermarkKind,
};
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, info};

use crate::orchestrator::{EntityJob, EntityOutcome};

/// Aggregates http events into per-template metric rows.
pub struct MetricsWorker {
    events: Arc<dyn EventStore>,
    config: ProcessorConfig,
}

impl MetricsWorker {
    pub fn new(events: Arc<dyn EventStore>, config: ProcessorConfig) -> Self {
        Self { events, config }
    }
}

#[async_trait]
impl EntityJob for MetricsWorker {
    fn kind(&self) -> WatermarkKind {
        WatermarkKind::MetricsReporting
    }

    fn default_lookback(&self) -> Duration {
        self.config.metrics_lookback()
    }

    async fn process(&self, app: &App, window: &ProcessingWindow) -> Result<EntityOutcome> {
        self.events
            .delete_http_metrics(app.team_id, app.id, window.from)
            .await?;

        let templates = self.events.fetch_url_templates(app.team_id, app.id).await?;
        if templates.is_empty() {
            debug!("No url templates for app");
            return Ok(EntityOutcome::Skipped);
        }
        let matcher = TemplateMatcher::new(&templates);

        let events = self
            .events
            .fetch_http_events(app.team_id, app.id, window, self.config.max_latency_ms)
            .await?;

        let rollup = aggregate_events(
            app,
            &events,
            &matcher,
            window,
            self.config.bucket(),
            self.config.max_latency_ms,
        );
        let m = metrics();
        m.events_aggregated.inc_by(rollup.matched_events);
        m.events_dropped.inc_by(rollup.dropped_events);

        let inserted = if rollup.rows.is_empty() {
            0
        } else {
            self.events.insert_http_metrics(&rollup.rows).await?
        };
        m.metric_rows_inserted.inc_by(inserted as u64);

        info!(
            templates = matcher.len(),
            events = events.len(),
            matched = rollup.matched_events,
            dropped = rollup.dropped_events,
            rows = inserted,
            "Aggregated http metrics"
        );
        Ok(EntityOutcome::Processed)
    }
}
