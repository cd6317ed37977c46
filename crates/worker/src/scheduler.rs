//! Worker scheduler for the periodic jobs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use clickhouse_client::ClickHouseClient;
use metadata_store::PgMetadataStore;
use telemetry::health;

use crate::metrics::MetricsWorker;
use crate::orchestrator::{Orchestrator, RunReport};
use crate::patterns::PatternWorker;

/// Worker scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Pattern discovery interval
    #[serde(with = "secs")]
    pub pattern_interval: Duration,
    /// Metrics aggregation interval
    #[serde(with = "secs")]
    pub metrics_interval: Duration,
    /// Internal metrics flush interval
    #[serde(with = "secs")]
    pub metrics_flush_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pattern_interval: Duration::from_secs(3600), // 1 hour
            metrics_interval: Duration::from_secs(900),  // 15 minutes
            metrics_flush_interval: Duration::from_secs(60),
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Reports from one pattern run followed by one metrics run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleReport {
    pub patterns: RunReport,
    pub metrics: RunReport,
}

/// Concrete store clients used for health checks and the metrics flush.
#[derive(Clone)]
pub struct Stores {
    pub clickhouse: Arc<ClickHouseClient>,
    pub postgres: Arc<PgMetadataStore>,
}

impl Stores {
    /// Re-checks both connections and updates the health registry.
    pub async fn refresh_health(&self) {
        let ch_ok = clickhouse_client::health::check_connection(&self.clickhouse).await;
        health().clickhouse.record(ch_ok, "ClickHouse connection failed");

        let pg_ok = metadata_store::health::check_connection(&self.postgres).await;
        health().postgres.record(pg_ok, "Postgres connection failed");
    }
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    orchestrator: Orchestrator,
    patterns: PatternWorker,
    metrics: MetricsWorker,
    stores: Option<Stores>,
}

impl WorkerScheduler {
    pub fn new(
        config: WorkerConfig,
        orchestrator: Orchestrator,
        patterns: PatternWorker,
        metrics: MetricsWorker,
    ) -> Self {
        Self {
            config,
            orchestrator,
            patterns,
            metrics,
            stores: None,
        }
    }

    /// Enables health refresh on every tick and the internal metrics flush.
    pub fn with_stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    async fn refresh_health(&self) {
        if let Some(stores) = &self.stores {
            stores.refresh_health().await;
        }
    }

    /// Runs pattern discovery, then metrics aggregation, once each.
    pub async fn run_once(&self) -> CycleReport {
        let patterns = self.orchestrator.run(&self.patterns, Utc::now()).await;
        let metrics = self.orchestrator.run(&self.metrics, Utc::now()).await;
        CycleReport { patterns, metrics }
    }

    /// Starts all background loops.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_pattern_loop().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_metrics_loop().await;
        }));

        if self.stores.is_some() {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_metrics_flush().await;
            }));
        }

        info!(
            pattern_interval_secs = self.config.pattern_interval.as_secs(),
            metrics_interval_secs = self.config.metrics_interval.as_secs(),
            "Background workers started"
        );
        handles
    }

    async fn run_pattern_loop(&self) {
        let mut ticker = interval(self.config.pattern_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.refresh_health().await;
            self.orchestrator.run(&self.patterns, Utc::now()).await;
        }
    }

    async fn run_metrics_loop(&self) {
        let mut ticker = interval(self.config.metrics_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.refresh_health().await;
            self.orchestrator.run(&self.metrics, Utc::now()).await;
        }
    }

    async fn run_metrics_flush(&self) {
        use clickhouse_client::insert::insert_internal_metrics;
        use telemetry::metrics;

        let Some(stores) = self.stores.as_ref() else {
            return;
        };
        let mut ticker = interval(self.config.metrics_flush_interval);

        loop {
            ticker.tick().await;

            let snapshot = metrics().snapshot();
            if let Err(e) = insert_internal_metrics(&stores.clickhouse, snapshot).await {
                error!("Failed to flush metrics: {}", e);
            }
        }
    }
}
