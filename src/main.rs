//! Semantic event pipeline worker.
//!
//! Consumes raw behavioral events from a Redis list, labels them, and
//! writes them to Postgres in atomic batches:
//! - size/time bounded batching
//! - dead-letter queue for batches the store rejects
//! - graceful drain of buffered events on SIGINT/SIGTERM

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use queue::{QueueConfig, RedisQueue};
use storage::{PgEventSink, StorageClient, StorageConfig, PRODUCTION_MAX_CONNECTIONS};
use telemetry::{health, init_tracing, metrics, TracingConfig};
use worker::{Shutdown, Worker, WorkerConfig, WorkerStats};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    /// Deployment environment; `prd` enlarges the storage pool
    #[serde(default = "default_environment")]
    environment: String,

    #[serde(default)]
    queue: QueueConfig,

    #[serde(default)]
    storage: StorageConfig,

    #[serde(default)]
    worker: WorkerConfig,

    #[serde(default)]
    log: TracingConfig,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            queue: QueueConfig::default(),
            storage: StorageConfig::default(),
            worker: WorkerConfig::default(),
            log: TracingConfig::default(),
        }
    }
}

impl Config {
    fn validate(&self) -> Result<()> {
        self.queue.validate()?;
        self.storage.validate()?;
        self.worker.validate(&self.queue.queue_name)?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = load_config()?;

    init_tracing(&telemetry::apply_env_overrides(config.log.clone()));

    info!(
        "Starting semantic pipeline worker v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    config.validate().context("Invalid configuration")?;

    let queue = Arc::new(
        RedisQueue::connect(config.queue.clone())
            .await
            .context("Failed to connect to Redis")?,
    );

    let storage = StorageClient::connect(config.storage.clone())
        .await
        .context("Failed to connect to Postgres")?;

    if config.storage.bootstrap_schema {
        storage::schema::ensure_schema(&storage)
            .await
            .context("Failed to initialize Postgres schema")?;
    }

    check_health(&config, &storage).await;

    let sink = Arc::new(PgEventSink::new(storage.clone()));
    let worker = Worker::new(queue, sink, config.worker.clone());

    let (shutdown, signal) = Shutdown::new();
    let handle = tokio::spawn(worker.run(signal));

    shutdown_signal().await;
    shutdown.trigger();

    // The worker observes the signal after its current pop returns
    let stats = join_worker(handle, &storage).await?;

    if stats.events_lost > 0 {
        error!(lost = stats.events_lost, "Events were lost during this run");
    }

    let snapshot = metrics().snapshot();
    info!(
        committed = snapshot.events_committed,
        dead_lettered = snapshot.events_dead_lettered,
        malformed = snapshot.events_malformed,
        commit_latency_mean_ms = snapshot.commit_latency_mean_ms,
        "Shutdown complete"
    );
    Ok(())
}

/// Waits for the worker, then closes the storage pool whether or not it panicked.
async fn join_worker(
    handle: JoinHandle<WorkerStats>,
    storage: &StorageClient,
) -> Result<WorkerStats> {
    let joined = handle.await;
    storage.close().await;
    joined.context("Worker task panicked")
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
        // Override with environment variables, e.g. PIPELINE__WORKER__BATCH_SIZE
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("PIPELINE")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat variable names shared with the ingress service
    if let Ok(environment) = std::env::var("ENVIRONMENT") {
        config.environment = environment;
    }
    if let Ok(url) = std::env::var("REDIS_URL") {
        config.queue.redis_url = url;
    }
    if let Ok(name) = std::env::var("QUEUE_NAME") {
        config.queue.queue_name = name;
    }
    if let Ok(name) = std::env::var("DLQ_NAME") {
        config.worker.dlq_name = name;
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.storage.database_url = url;
    }
    if let Ok(size) = std::env::var("BATCH_SIZE") {
        config.worker.batch_size = size
            .parse()
            .with_context(|| format!("BATCH_SIZE must be a positive integer, got {:?}", size))?;
    }
    if let Ok(interval) = std::env::var("FLUSH_INTERVAL") {
        config.worker.flush_interval_secs = interval
            .parse()
            .with_context(|| format!("FLUSH_INTERVAL must be a number of seconds, got {:?}", interval))?;
    }

    if config.environment == "prd"
        && config.storage.max_connections == StorageConfig::default().max_connections
    {
        config.storage.max_connections = PRODUCTION_MAX_CONNECTIONS;
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(config: &Config, storage: &StorageClient) {
    // Check Redis
    if queue::health::check_connection(&config.queue).await {
        health().redis.set_healthy();
        info!("Redis connection: healthy");
    } else {
        health().redis.set_unhealthy("Connection failed");
        error!("Redis connection: unhealthy");
    }

    // Check Postgres
    if storage::health::check_connection(storage).await {
        health().postgres.set_healthy();
        info!("Postgres connection: healthy");
    } else {
        health().postgres.set_unhealthy("Connection failed");
        error!("Postgres connection: unhealthy");
    }

    let report = health().report();
    if health().is_ready() {
        info!(status = ?report.status, "Worker ready");
    } else {
        warn!(status = ?report.status, "Worker starting without a healthy queue connection");
    }

    if let Some(depth) = queue::health::queue_depth(&config.queue, &config.worker.dlq_name).await {
        if depth > 0 {
            warn!(dlq = %config.worker.dlq_name, depth, "DLQ holds events awaiting replay");
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
