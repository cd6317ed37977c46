//! Postgres health checks and schema bootstrap.

use crate::client::{write_error, PgMetadataStore};
use crate::schema::all_tables;
use processor_core::Result;
use tracing::{debug, error};

/// Check Postgres connection health.
pub async fn check_connection(store: &PgMetadataStore) -> bool {
    match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(store.pool())
        .await
    {
        Ok(_) => {
            debug!("Postgres connection healthy");
            true
        }
        Err(e) => {
            error!(error = %e, "Postgres health check failed");
            false
        }
    }
}

/// Creates the schema and tables if they don't exist.
pub async fn init_schema(store: &PgMetadataStore) -> Result<()> {
    for ddl in all_tables(&store.config().schema) {
        sqlx::query(&ddl)
            .execute(store.pool())
            .await
            .map_err(|e| write_error("schema init", e))?;
    }

    debug!(schema = %store.config().schema, "Postgres schema initialized");
    Ok(())
}
