//! Record types read from and written to the event store.
//!
//! Each query shape gets its own explicit record; nothing downstream works
//! with open-ended key/value rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request count for one distinct (domain, path) in a window.
///
/// Discovery consumes these pre-grouped rows, never one row per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpPathCount {
    pub team_id: Uuid,
    pub app_id: Uuid,
    pub domain: String,
    pub path: String,
    pub count: u64,
}

/// A single raw HTTP request captured by an SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEvent {
    pub team_id: Uuid,
    pub app_id: Uuid,
    /// When the request happened on the device.
    pub timestamp: DateTime<Utc>,
    /// When the event reached the store. Windows are cut on this column.
    pub inserted_at: DateTime<Utc>,
    pub protocol: String,
    pub port: u16,
    pub domain: String,
    pub path: String,
    pub method: String,
    pub status_code: u16,
    pub latency_ms: u64,
    pub app_version: String,
    pub os_version: String,
    pub device_manufacturer: String,
    pub device_name: String,
    pub network_provider: String,
    pub network_type: String,
    pub network_generation: String,
    pub device_locale: String,
}

/// A persisted endpoint template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTemplate {
    pub team_id: Uuid,
    pub app_id: Uuid,
    pub domain: String,
    pub path: String,
    pub last_updated_at: DateTime<Utc>,
}

impl UrlTemplate {
    /// Key that identifies a template for upsert purposes.
    pub fn key(&self) -> (Uuid, Uuid, &str, &str) {
        (self.team_id, self.app_id, &self.domain, &self.path)
    }
}
