//! Pattern discovery job.
//!
//! For one app and window: read grouped (domain, path) counts, normalize
//! each path, build a fresh trie, extract patterns and upsert the ones with
//! enough support as templates.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use processor_core::normalize::normalize_path;
use processor_core::pattern::select_templates;
use processor_core::{
    App, EventStore, HttpPathCount, PatternTrie, ProcessingWindow, ProcessorConfig, Result,
    UrlTemplate, WatermarkKind,
};
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, info};

use crate::orchestrator::{EntityJob, EntityOutcome};

/// Builds templates for `app` from grouped path counts.
pub fn discover_templates(
    app: &App,
    counts: &[HttpPathCount],
    config: &ProcessorConfig,
    updated_at: DateTime<Utc>,
) -> Vec<UrlTemplate> {
    let mut trie = PatternTrie::with_config(config.trie());
    for row in counts {
        trie.insert(&row.domain, &normalize_path(&row.path), row.count);
    }
    select_templates(
        app,
        trie.extract_patterns(),
        config.min_pattern_support,
        updated_at,
    )
}

/// Discovers and persists endpoint templates.
pub struct PatternWorker {
    events: Arc<dyn EventStore>,
    config: ProcessorConfig,
}

impl PatternWorker {
    pub fn new(events: Arc<dyn EventStore>, config: ProcessorConfig) -> Self {
        Self { events, config }
    }
}

#[async_trait]
impl EntityJob for PatternWorker {
    fn kind(&self) -> WatermarkKind {
        WatermarkKind::PatternGeneration
    }

    fn default_lookback(&self) -> Duration {
        self.config.patterns_lookback()
    }

    async fn process(&self, app: &App, window: &ProcessingWindow) -> Result<EntityOutcome> {
        let counts = self
            .events
            .fetch_path_counts(app.team_id, app.id, window)
            .await?;
        if counts.is_empty() {
            debug!("No http events in window");
            return Ok(EntityOutcome::Skipped);
        }
        metrics().path_counts_read.inc_by(counts.len() as u64);

        let templates = discover_templates(app, &counts, &self.config, window.to);
        if templates.is_empty() {
            debug!(
                distinct_paths = counts.len(),
                min_support = self.config.min_pattern_support,
                "No pattern reached minimum support"
            );
            return Ok(EntityOutcome::Skipped);
        }

        let written = self.events.upsert_url_patterns(&templates).await?;
        metrics().patterns_upserted.inc_by(written as u64);

        info!(
            distinct_paths = counts.len(),
            patterns = written,
            "Upserted url patterns"
        );
        Ok(EntityOutcome::Processed)
    }
}
