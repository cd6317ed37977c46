//! Internal telemetry for the network metrics processor.
//!
//! Metrics are kept in-process, exposed on the probe server and flushed to
//! the event store's `internal_metrics` table.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
