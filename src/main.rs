//! Network Metrics Processor
//!
//! Periodic batch processor for HTTP telemetry:
//! - Endpoint template discovery from raw request paths
//! - Per-template HTTP metric rollups with latency sketches
//! - Per-app watermarks so every window is processed once
//! - Health and metrics probes for the orchestrator

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use api::router;
use clickhouse_client::{ClickHouseClient, ClickHouseConfig};
use metadata_store::{PgMetadataStore, PostgresConfig};
use processor_core::{validate_config, ProcessorConfig};
use telemetry::init_tracing_from_env;
use worker::{MetricsWorker, Orchestrator, PatternWorker, Stores, WorkerConfig, WorkerScheduler};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Process every app once, then exit without serving probes
    #[serde(default)]
    run_once: bool,

    #[serde(default)]
    processor: ProcessorConfig,

    #[serde(default)]
    scheduler: WorkerConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    postgres: PostgresConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            run_once: false,
            processor: ProcessorConfig::default(),
            scheduler: WorkerConfig::default(),
            clickhouse: ClickHouseConfig::default(),
            postgres: PostgresConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Network Metrics Processor v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    validate_config(&config.processor).context("Invalid processor configuration")?;

    info!(
        clickhouse_url = %config.clickhouse.url,
        clickhouse_database = %config.clickhouse.database,
        postgres_schema = %config.postgres.schema,
        min_pattern_support = config.processor.min_pattern_support,
        high_cardinality_threshold = config.processor.high_cardinality_threshold,
        "Loaded config"
    );

    let clickhouse = Arc::new(
        ClickHouseClient::new(config.clickhouse.clone())
            .context("Failed to create ClickHouse client")?,
    );
    let postgres = Arc::new(
        PgMetadataStore::connect_lazy(config.postgres.clone())
            .context("Failed to create Postgres pool")?,
    );

    // Continue on failure, the schema might already exist
    if let Err(e) = clickhouse_client::health::init_schema(&clickhouse).await {
        error!("Failed to initialize ClickHouse schema: {}", e);
    }
    if let Err(e) = metadata_store::health::init_schema(&postgres).await {
        error!("Failed to initialize Postgres schema: {}", e);
    }

    let stores = Stores {
        clickhouse: clickhouse.clone(),
        postgres: postgres.clone(),
    };
    stores.refresh_health().await;
    log_health();

    let scheduler = WorkerScheduler::new(
        config.scheduler.clone(),
        Orchestrator::new(postgres.clone()),
        PatternWorker::new(clickhouse.clone(), config.processor.clone()),
        MetricsWorker::new(clickhouse.clone(), config.processor.clone()),
    )
    .with_stores(stores);

    if config.run_once {
        let report = scheduler.run_once().await;
        info!(
            patterns_processed = report.patterns.processed,
            patterns_failed = report.patterns.failed,
            metrics_processed = report.metrics.processed,
            metrics_failed = report.metrics.failed,
            "Single run complete"
        );
        postgres.close().await;
        return Ok(());
    }

    let _worker_handles = Arc::new(scheduler).start();

    let app = router();

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down...");
    postgres.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("PROCESSOR")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(url) = std::env::var("CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(database) = std::env::var("CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.postgres.url = url;
    }
    if let Ok(schema) = std::env::var("POSTGRES_SCHEMA") {
        config.postgres.schema = schema;
    }
    if let Ok(run_once) = std::env::var("PROCESSOR_RUN_ONCE") {
        config.run_once = matches!(run_once.as_str(), "1" | "true" | "yes");
    }

    Ok(config)
}

fn log_health() {
    let report = telemetry::health().report();
    for component in &report.components {
        if component.healthy {
            info!("{} connection: healthy", component.name);
        } else {
            error!("{} connection: unhealthy", component.name);
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
