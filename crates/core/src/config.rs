//! Processing configuration.
//!
//! Loaded by the binary from defaults, `config/default.toml` and
//! `PROCESSOR__PROCESSOR__*` environment variables.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Error, Result};
use crate::pattern::DEFAULT_MIN_PATTERN_SUPPORT;
use crate::trie::{TrieConfig, DEFAULT_HIGH_CARDINALITY_THRESHOLD, DEFAULT_MIN_COLLAPSE_DEPTH};

/// Default lookback when an aspect has no watermark yet (24h).
pub const DEFAULT_LOOKBACK_SECS: i64 = 24 * 60 * 60;

/// Default rollup bucket width.
pub const DEFAULT_BUCKET_MINUTES: i64 = 15;

/// Events slower than this are treated as outliers and not aggregated.
pub const DEFAULT_MAX_LATENCY_MS: u64 = 60_000;

/// Tunables for pattern discovery and metrics aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProcessorConfig {
    /// Minimum request count for a pattern to be persisted
    #[serde(default = "default_min_pattern_support")]
    #[validate(range(min = 1))]
    pub min_pattern_support: u64,

    /// Pattern lookback when no watermark exists
    #[serde(default = "default_lookback_secs")]
    #[validate(range(min = 60, max = 2_592_000))]
    pub patterns_lookback_secs: i64,

    /// Metrics lookback when no watermark exists
    #[serde(default = "default_lookback_secs")]
    #[validate(range(min = 60, max = 2_592_000))]
    pub metrics_lookback_secs: i64,

    /// Distinct children at which a trie node collapses
    #[serde(default = "default_high_cardinality_threshold")]
    #[validate(range(min = 1, max = 10_000))]
    pub high_cardinality_threshold: usize,

    /// Shallowest trie depth allowed to collapse
    #[serde(default = "default_min_collapse_depth")]
    #[validate(range(max = 64))]
    pub min_collapse_depth: usize,

    /// Rollup bucket width in minutes
    #[serde(default = "default_bucket_minutes")]
    #[validate(range(min = 1, max = 1440))]
    pub bucket_minutes: i64,

    /// Upper bound on aggregated latency
    #[serde(default = "default_max_latency_ms")]
    #[validate(range(min = 1))]
    pub max_latency_ms: u64,
}

fn default_min_pattern_support() -> u64 {
    DEFAULT_MIN_PATTERN_SUPPORT
}

fn default_lookback_secs() -> i64 {
    DEFAULT_LOOKBACK_SECS
}

fn default_high_cardinality_threshold() -> usize {
    DEFAULT_HIGH_CARDINALITY_THRESHOLD
}

fn default_min_collapse_depth() -> usize {
    DEFAULT_MIN_COLLAPSE_DEPTH
}

fn default_bucket_minutes() -> i64 {
    DEFAULT_BUCKET_MINUTES
}

fn default_max_latency_ms() -> u64 {
    DEFAULT_MAX_LATENCY_MS
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            min_pattern_support: default_min_pattern_support(),
            patterns_lookback_secs: default_lookback_secs(),
            metrics_lookback_secs: default_lookback_secs(),
            high_cardinality_threshold: default_high_cardinality_threshold(),
            min_collapse_depth: default_min_collapse_depth(),
            bucket_minutes: default_bucket_minutes(),
            max_latency_ms: default_max_latency_ms(),
        }
    }
}

impl ProcessorConfig {
    pub fn patterns_lookback(&self) -> Duration {
        Duration::seconds(self.patterns_lookback_secs)
    }

    pub fn metrics_lookback(&self) -> Duration {
        Duration::seconds(self.metrics_lookback_secs)
    }

    pub fn bucket(&self) -> Duration {
        Duration::minutes(self.bucket_minutes)
    }

    pub fn trie(&self) -> TrieConfig {
        TrieConfig {
            high_cardinality_threshold: self.high_cardinality_threshold,
            min_collapse_depth: self.min_collapse_depth,
        }
    }
}

/// Validates a processor configuration.
pub fn validate_config(config: &ProcessorConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| Error::config(format!("{}", e)))
}
