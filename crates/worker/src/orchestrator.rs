//! Incremental watermark orchestrator.
//!
//! Walks every team and app, computes the app's next window for one aspect
//! and runs a job over it. The aspect's watermark advances to the window end
//! only when the job reports `Processed`. A failing team or app is logged
//! and counted; the walk always continues.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use processor_core::{App, MetadataStore, ProcessingWindow, Result, WatermarkKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// What a job did with one app's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOutcome {
    /// Results were written; the watermark may advance.
    Processed,
    /// Nothing to do for this window; the watermark stays.
    Skipped,
}

/// Per-app unit of work for one aspect.
#[async_trait]
pub trait EntityJob: Send + Sync {
    /// Watermark this job advances.
    fn kind(&self) -> WatermarkKind;

    /// Window length used when the app has no watermark yet.
    fn default_lookback(&self) -> Duration;

    async fn process(&self, app: &App, window: &ProcessingWindow) -> Result<EntityOutcome>;
}

/// Outcome counts of one orchestrator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub teams_failed: usize,
    /// Listing teams failed and nothing ran.
    pub listing_failed: bool,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }
}

enum AppResult {
    Processed,
    Skipped,
    Failed,
}

/// Drives an [`EntityJob`] over every (team, app).
#[derive(Clone)]
pub struct Orchestrator {
    metadata: Arc<dyn MetadataStore>,
}

impl Orchestrator {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Runs `job` once. `now` is the end of every window in this run.
    pub async fn run(&self, job: &dyn EntityJob, now: DateTime<Utc>) -> RunReport {
        let kind = job.kind();
        let started = Instant::now();
        let mut report = RunReport::default();

        match self.metadata.list_teams().await {
            Ok(teams) => {
                for team in teams {
                    let apps = match self.metadata.list_apps(team.id).await {
                        Ok(apps) => apps,
                        Err(e) => {
                            error!(team_id = %team.id, aspect = %kind, error = %e, "Failed to list apps");
                            report.teams_failed += 1;
                            continue;
                        }
                    };

                    for app in apps {
                        let span = info_span!("app", team_id = %app.team_id, app_id = %app.id, aspect = %kind);
                        match self.run_app(job, &app, now).instrument(span).await {
                            AppResult::Processed => report.processed += 1,
                            AppResult::Skipped => report.skipped += 1,
                            AppResult::Failed => report.failed += 1,
                        }
                    }
                }
            }
            Err(e) => {
                error!(aspect = %kind, error = %e, "Failed to list teams");
                report.listing_failed = true;
            }
        }

        record_run(kind, &report, started, now);
        info!(
            aspect = %kind,
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            teams_failed = report.teams_failed,
            listing_failed = report.listing_failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run complete"
        );
        report
    }

    async fn run_app(&self, job: &dyn EntityJob, app: &App, now: DateTime<Utc>) -> AppResult {
        let kind = job.kind();

        let stored = match self.metadata.get_watermark(app.team_id, app.id).await {
            Ok(mark) => mark.and_then(|m| m.get(kind)),
            Err(e) => {
                error!(error = %e, "Failed to read watermark");
                return AppResult::Failed;
            }
        };

        let Some(window) = ProcessingWindow::next(stored, now, job.default_lookback()) else {
            debug!(watermark = ?stored, "Window is empty");
            return AppResult::Skipped;
        };

        match job.process(app, &window).await {
            Ok(EntityOutcome::Processed) => {
                if let Err(e) = self
                    .metadata
                    .upsert_watermark(app.team_id, app.id, kind, window.to)
                    .await
                {
                    error!(error = %e, "Failed to advance watermark");
                    return AppResult::Failed;
                }
                debug!(from = %window.from, to = %window.to, "Processed window");
                AppResult::Processed
            }
            Ok(EntityOutcome::Skipped) => {
                debug!(from = %window.from, to = %window.to, "Skipped window");
                AppResult::Skipped
            }
            Err(e) => {
                warn!(from = %window.from, to = %window.to, error = %e, "Job failed");
                AppResult::Failed
            }
        }
    }
}

fn record_run(kind: WatermarkKind, report: &RunReport, started: Instant, now: DateTime<Utc>) {
    let m = metrics();
    let elapsed = started.elapsed().as_millis() as u64;
    let finished_at = now.timestamp().max(0) as u64;
    match kind {
        WatermarkKind::PatternGeneration => {
            m.pattern_runs.inc();
            m.pattern_run_latency_ms.observe(elapsed);
            m.last_pattern_run_at.set(finished_at);
        }
        WatermarkKind::MetricsReporting => {
            m.metrics_runs.inc();
            m.metrics_run_latency_ms.observe(elapsed);
            m.last_metrics_run_at.set(finished_at);
        }
    }
    m.apps_processed.inc_by(report.processed as u64);
    m.apps_skipped.inc_by(report.skipped as u64);
    m.apps_failed.inc_by(report.failed as u64);
    m.teams_failed.inc_by(report.teams_failed as u64);
    if report.listing_failed {
        m.listing_failures.inc();
    }
}
