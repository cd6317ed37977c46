//! ClickHouse health checks and schema bootstrap.

use crate::client::ClickHouseClient;
use crate::schema::all_tables;
use processor_core::{Error, Result};
use tracing::{debug, error};

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.inner().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!(error = %e, "ClickHouse health check failed");
            false
        }
    }
}

/// Creates the database and all tables if they don't exist.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    let server = client.server();
    for ddl in all_tables(&client.config().database) {
        server
            .query(&ddl)
            .execute()
            .await
            .map_err(|e| Error::events_write(format!("schema init failed: {}", e)))?;
    }

    debug!(database = %client.config().database, "ClickHouse schema initialized");
    Ok(())
}
