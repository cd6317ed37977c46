//! Postgres pool wrapper.

use crate::config::PostgresConfig;
use processor_core::{Error, Result, StoreErrorCode, StoreKind};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use telemetry::metrics;
use tracing::info;

/// Metadata store over a Postgres connection pool.
#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
    config: PostgresConfig,
}

impl std::fmt::Debug for PgMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgMetadataStore")
            .field("schema", &self.config.schema)
            .finish_non_exhaustive()
    }
}

impl PgMetadataStore {
    /// Connects a pool eagerly.
    pub async fn connect(config: PostgresConfig) -> Result<Self> {
        validate_identifier(&config.schema)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| connection_error(&e))?;

        info!(
            schema = %config.schema,
            max_connections = config.max_connections,
            "Connected to Postgres"
        );

        Ok(Self { pool, config })
    }

    /// Builds a store with a pool that connects on first use.
    pub fn connect_lazy(config: PostgresConfig) -> Result<Self> {
        validate_identifier(&config.schema)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(&config.url)
            .map_err(|e| connection_error(&e))?;

        Ok(Self { pool, config })
    }

    /// Get the underlying sqlx pool for direct query execution.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    /// Schema-qualified table name.
    pub(crate) fn table(&self, name: &str) -> String {
        format!("{}.{}", self.config.schema, name)
    }

    /// Close the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Schema names are interpolated into SQL, so only plain identifiers pass.
fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(Error::config(format!("invalid postgres schema name: {:?}", name)))
    }
}

fn connection_error(e: &sqlx::Error) -> Error {
    metrics().metadata_store_errors.inc();
    Error::store(
        StoreKind::Metadata,
        StoreErrorCode::ConnectionFailed,
        e.to_string(),
    )
}

/// Maps a failed read.
pub(crate) fn query_error(context: &str, e: sqlx::Error) -> Error {
    metrics().metadata_store_errors.inc();
    Error::metadata_query(format!("{}: {}", context, e))
}

/// Maps a failed write.
pub(crate) fn write_error(context: &str, e: sqlx::Error) -> Error {
    metrics().metadata_store_errors.inc();
    Error::metadata_write(format!("{}: {}", context, e))
}
