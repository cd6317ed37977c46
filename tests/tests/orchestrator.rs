//! Watermark orchestration tests.
//!
//! A recording job stands in for the real workers so each test controls the
//! per-app outcome and can inspect the windows the orchestrator handed out.

use async_trait::async_trait;
use chrono::Duration;
use integration_tests::fixtures::{base_time, minutes_after};
use integration_tests::mocks::InMemoryMetadataStore;
use parking_lot::Mutex;
use processor_core::{App, Error, ProcessingWindow, Result, WatermarkKind};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use worker::{EntityJob, EntityOutcome, Orchestrator, RunReport};

#[derive(Clone, Copy)]
enum Outcome {
    Process,
    Skip,
    Fail,
}

struct RecordingJob {
    kind: WatermarkKind,
    outcomes: Mutex<HashMap<Uuid, Outcome>>,
    windows: Mutex<Vec<(Uuid, ProcessingWindow)>>,
}

impl RecordingJob {
    fn new(kind: WatermarkKind) -> Self {
        Self {
            kind,
            outcomes: Mutex::new(HashMap::new()),
            windows: Mutex::new(Vec::new()),
        }
    }

    fn set(&self, app: &App, outcome: Outcome) {
        self.outcomes.lock().insert(app.id, outcome);
    }

    fn windows_for(&self, app: &App) -> Vec<ProcessingWindow> {
        self.windows
            .lock()
            .iter()
            .filter(|(id, _)| *id == app.id)
            .map(|(_, w)| *w)
            .collect()
    }
}

#[async_trait]
impl EntityJob for RecordingJob {
    fn kind(&self) -> WatermarkKind {
        self.kind
    }

    fn default_lookback(&self) -> Duration {
        Duration::hours(24)
    }

    async fn process(&self, app: &App, window: &ProcessingWindow) -> Result<EntityOutcome> {
        self.windows.lock().push((app.id, *window));
        let outcome = self
            .outcomes
            .lock()
            .get(&app.id)
            .copied()
            .unwrap_or(Outcome::Process);
        match outcome {
            Outcome::Process => Ok(EntityOutcome::Processed),
            Outcome::Skip => Ok(EntityOutcome::Skipped),
            Outcome::Fail => Err(Error::events_query("recording job failure")),
        }
    }
}

fn setup(apps_per_team: &[usize]) -> (Arc<InMemoryMetadataStore>, Orchestrator, Vec<App>) {
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let mut apps = Vec::new();
    for n in apps_per_team {
        let ids: Vec<Uuid> = (0..*n).map(|_| Uuid::new_v4()).collect();
        apps.extend(metadata.add_team(Uuid::new_v4(), &ids));
    }
    let orchestrator = Orchestrator::new(metadata.clone());
    (metadata, orchestrator, apps)
}

#[tokio::test]
async fn test_first_run_uses_default_lookback() {
    let (metadata, orchestrator, apps) = setup(&[1]);
    let job = RecordingJob::new(WatermarkKind::PatternGeneration);
    let now = base_time();

    let report = orchestrator.run(&job, now).await;

    assert_eq!(report.processed, 1);
    let windows = job.windows_for(&apps[0]);
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].from, now - Duration::hours(24));
    assert_eq!(windows[0].to, now);
    assert_eq!(
        metadata.watermark(&apps[0], WatermarkKind::PatternGeneration),
        Some(now)
    );
}

#[tokio::test]
async fn test_next_run_starts_at_previous_watermark() {
    let (_metadata, orchestrator, apps) = setup(&[1]);
    let job = RecordingJob::new(WatermarkKind::MetricsReporting);

    orchestrator.run(&job, minutes_after(0)).await;
    orchestrator.run(&job, minutes_after(15)).await;

    let windows = job.windows_for(&apps[0]);
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[1].from, minutes_after(0));
    assert_eq!(windows[1].to, minutes_after(15));
}

#[tokio::test]
async fn test_skipped_app_keeps_watermark() {
    let (metadata, orchestrator, apps) = setup(&[1]);
    let job = RecordingJob::new(WatermarkKind::PatternGeneration);
    let stored = minutes_after(-60);
    metadata.set_watermark(&apps[0], WatermarkKind::PatternGeneration, stored);
    job.set(&apps[0], Outcome::Skip);

    let report = orchestrator.run(&job, base_time()).await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.processed, 0);
    assert_eq!(
        metadata.watermark(&apps[0], WatermarkKind::PatternGeneration),
        Some(stored)
    );
}

#[tokio::test]
async fn test_failed_app_is_retried_from_the_same_start() {
    let (metadata, orchestrator, apps) = setup(&[1]);
    let job = RecordingJob::new(WatermarkKind::MetricsReporting);
    let stored = minutes_after(-30);
    metadata.set_watermark(&apps[0], WatermarkKind::MetricsReporting, stored);

    job.set(&apps[0], Outcome::Fail);
    let report = orchestrator.run(&job, minutes_after(0)).await;
    assert_eq!(report.failed, 1);
    assert_eq!(
        metadata.watermark(&apps[0], WatermarkKind::MetricsReporting),
        Some(stored)
    );

    job.set(&apps[0], Outcome::Process);
    orchestrator.run(&job, minutes_after(15)).await;

    let windows = job.windows_for(&apps[0]);
    assert_eq!(windows[0].from, stored);
    assert_eq!(windows[1].from, stored);
    assert_eq!(windows[1].to, minutes_after(15));
    assert_eq!(
        metadata.watermark(&apps[0], WatermarkKind::MetricsReporting),
        Some(minutes_after(15))
    );
}

#[tokio::test]
async fn test_watermark_write_failure_counts_as_failed() {
    let (metadata, orchestrator, apps) = setup(&[1]);
    let job = RecordingJob::new(WatermarkKind::PatternGeneration);
    metadata.set_fail_watermark_writes(true);

    let report = orchestrator.run(&job, base_time()).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.processed, 0);
    assert_eq!(job.windows_for(&apps[0]).len(), 1);
    assert_eq!(metadata.watermark(&apps[0], WatermarkKind::PatternGeneration), None);
}

#[tokio::test]
async fn test_one_failing_app_does_not_stop_the_run() {
    let (metadata, orchestrator, apps) = setup(&[3]);
    let job = RecordingJob::new(WatermarkKind::PatternGeneration);
    job.set(&apps[1], Outcome::Fail);

    let report = orchestrator.run(&job, base_time()).await;

    assert_eq!(
        report,
        RunReport {
            processed: 2,
            skipped: 0,
            failed: 1,
            teams_failed: 0,
            listing_failed: false,
        }
    );
    assert!(metadata.watermark(&apps[0], WatermarkKind::PatternGeneration).is_some());
    assert!(metadata.watermark(&apps[1], WatermarkKind::PatternGeneration).is_none());
    assert!(metadata.watermark(&apps[2], WatermarkKind::PatternGeneration).is_some());
}

#[tokio::test]
async fn test_failing_team_does_not_stop_other_teams() {
    let (metadata, orchestrator, apps) = setup(&[1, 2]);
    let job = RecordingJob::new(WatermarkKind::PatternGeneration);
    metadata.fail_team(apps[0].team_id);

    let report = orchestrator.run(&job, base_time()).await;

    assert_eq!(report.teams_failed, 1);
    assert_eq!(report.processed, 2);
    assert!(job.windows_for(&apps[0]).is_empty());
}

#[tokio::test]
async fn test_listing_failure_runs_nothing() {
    let (metadata, orchestrator, _apps) = setup(&[2]);
    let job = RecordingJob::new(WatermarkKind::MetricsReporting);
    metadata.set_fail_list_teams(true);

    let report = orchestrator.run(&job, base_time()).await;

    assert!(report.listing_failed);
    assert_eq!(report.total(), 0);
    assert!(job.windows.lock().is_empty());
    assert_eq!(metadata.watermark_writes(), 0);
}

#[tokio::test]
async fn test_empty_window_is_skipped_without_running_job() {
    let (metadata, orchestrator, apps) = setup(&[1]);
    let job = RecordingJob::new(WatermarkKind::PatternGeneration);
    let now = base_time();
    metadata.set_watermark(&apps[0], WatermarkKind::PatternGeneration, now);

    let report = orchestrator.run(&job, now).await;

    assert_eq!(report.skipped, 1);
    assert!(job.windows_for(&apps[0]).is_empty());
}

#[tokio::test]
async fn test_aspects_keep_independent_watermarks() {
    let (metadata, orchestrator, apps) = setup(&[1]);
    let patterns = RecordingJob::new(WatermarkKind::PatternGeneration);
    let metrics = RecordingJob::new(WatermarkKind::MetricsReporting);
    metrics.set(&apps[0], Outcome::Fail);

    orchestrator.run(&patterns, base_time()).await;
    orchestrator.run(&metrics, base_time()).await;

    assert_eq!(
        metadata.watermark(&apps[0], WatermarkKind::PatternGeneration),
        Some(base_time())
    );
    assert_eq!(metadata.watermark(&apps[0], WatermarkKind::MetricsReporting), None);
}
