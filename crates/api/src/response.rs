//! Probe response bodies.

use serde::{Deserialize, Serialize};
use telemetry::{ComponentHealthReport, HealthReport, HealthStatus};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub clickhouse_connected: bool,
    pub postgres_connected: bool,
    pub components: Vec<ComponentHealthReport>,
}

impl From<HealthReport> for HealthResponse {
    fn from(report: HealthReport) -> Self {
        let connected = |name: &str| {
            report
                .components
                .iter()
                .any(|c| c.name == name && c.healthy)
        };
        let clickhouse_connected = connected("clickhouse");
        let postgres_connected = connected("postgres");
        Self {
            status: report.status,
            clickhouse_connected,
            postgres_connected,
            components: report.components,
        }
    }
}
