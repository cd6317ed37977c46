//! Core types, pattern discovery and rollup logic for the network metrics
//! processor.

pub mod config;
pub mod error;
pub mod events;
pub mod matcher;
pub mod normalize;
pub mod pattern;
pub mod rollup;
pub mod sketch;
pub mod store;
pub mod tenant;
pub mod trie;
pub mod watermark;

pub use config::{validate_config, ProcessorConfig};
pub use error::{Error, Result, StoreErrorCode, StoreKind};
pub use events::*;
pub use matcher::TemplateMatcher;
pub use pattern::{PatternResult, UrlPattern};
pub use rollup::{HttpMetricRow, LatencySummary, MetricKey, Rollup};
pub use sketch::{LatencyDigest, Percentiles};
pub use store::{EventStore, MetadataStore};
pub use tenant::*;
pub use trie::{PatternTrie, TrieConfig};
pub use watermark::{ProcessingWindow, Watermark, WatermarkKind};
