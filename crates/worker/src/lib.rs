//! Background workers for the network metrics processor.
//!
//! - Orchestrator (team/app walk with per-aspect watermarks)
//! - Patterns (url template discovery)
//! - Metrics (per-template rollups)
//! - Scheduler (periodic runs and internal metrics flush)

pub mod metrics;
pub mod orchestrator;
pub mod patterns;
pub mod scheduler;

pub use metrics::MetricsWorker;
pub use orchestrator::*;
pub use patterns::{discover_templates, PatternWorker};
pub use scheduler::*;
