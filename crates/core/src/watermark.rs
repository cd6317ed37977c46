//! Watermarks and processing windows.
//!
//! A watermark records how far an app's traffic has been durably processed.
//! Pattern generation and metrics reporting advance independently.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The aspect a watermark tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkKind {
    PatternGeneration,
    MetricsReporting,
}

impl WatermarkKind {
    /// Column holding this aspect in the reporting table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::PatternGeneration => "pattern_generated_at",
            Self::MetricsReporting => "metrics_reported_at",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatternGeneration => "patterns",
            Self::MetricsReporting => "metrics",
        }
    }
}

impl std::fmt::Display for WatermarkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reporting row per (team, app).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub team_id: Uuid,
    pub app_id: Uuid,
    pub pattern_generated_at: Option<DateTime<Utc>>,
    pub metrics_reported_at: Option<DateTime<Utc>>,
}

impl Watermark {
    pub fn new(team_id: Uuid, app_id: Uuid) -> Self {
        Self {
            team_id,
            app_id,
            pattern_generated_at: None,
            metrics_reported_at: None,
        }
    }

    /// Returns the stored timestamp for the given aspect.
    pub fn get(&self, kind: WatermarkKind) -> Option<DateTime<Utc>> {
        match kind {
            WatermarkKind::PatternGeneration => self.pattern_generated_at,
            WatermarkKind::MetricsReporting => self.metrics_reported_at,
        }
    }

    /// Sets the timestamp for the given aspect, leaving the other untouched.
    pub fn set(&mut self, kind: WatermarkKind, at: DateTime<Utc>) {
        match kind {
            WatermarkKind::PatternGeneration => self.pattern_generated_at = Some(at),
            WatermarkKind::MetricsReporting => self.metrics_reported_at = Some(at),
        }
    }
}

/// Half-open time window `[from, to)` to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ProcessingWindow {
    /// Computes the next window for an aspect.
    ///
    /// Starts at the stored watermark, or `now - default_lookback` when
    /// there is none. Always ends at `now`. Returns `None` for an empty or
    /// inverted window.
    pub fn next(
        stored: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        default_lookback: Duration,
    ) -> Option<Self> {
        let from = stored.unwrap_or(now - default_lookback);
        if from >= now {
            return None;
        }
        Some(Self { from, to: now })
    }

    pub fn duration(&self) -> Duration {
        self.to - self.from
    }

    /// True when `ts` falls inside `[from, to)`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.from && ts < self.to
    }
}
