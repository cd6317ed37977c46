//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use clickhouse::Client;
use processor_core::{Error, Result};
use std::time::Instant;
use telemetry::metrics;
use tracing::info;

/// ClickHouse client wrapper.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(Error::config("clickhouse url must not be empty"));
        }

        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_option("max_execution_time", config.timeout_secs.to_string());

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Client for statements that must run before the database exists.
    pub(crate) fn server(&self) -> Client {
        self.inner.clone().with_database("default")
    }

    /// Client whose inserts are buffered server-side when enabled.
    pub(crate) fn upserts(&self) -> Client {
        if self.config.async_insert {
            self.inner
                .clone()
                .with_option("async_insert", "1")
                .with_option("wait_for_async_insert", "1")
        } else {
            self.inner.clone()
        }
    }

    /// Client whose mutations block until applied on all replicas.
    pub(crate) fn mutations(&self) -> Client {
        self.inner.clone().with_option("mutations_sync", "2")
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }
}

/// Records latency and maps a driver error for one store call.
pub(crate) fn observe<T>(
    started: Instant,
    result: std::result::Result<T, clickhouse::error::Error>,
    map: impl FnOnce(String) -> Error,
) -> Result<T> {
    metrics()
        .event_store_latency_ms
        .observe(started.elapsed().as_millis() as u64);
    result.map_err(|e| {
        metrics().event_store_errors.inc();
        map(e.to_string())
    })
}
