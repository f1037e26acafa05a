//! Trailing Stop Engine Binary
//!
//! Runs the progressive trailing-stop monitor against a file-backed state
//! store and a JSON price snapshot, logging exit requests.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trailing-stop-engine
//! ```
//!
//! # Environment Variables
//!
//! - `TRAILING_STOP_CONFIG`: Path to the YAML config (default: `config.yaml`;
//!   built-in defaults are used when the file does not exist)
//! - `RUST_LOG`: Log filter, overrides `observability.logging.level`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use trailing_stop_engine::application::ports::{ExitSinkPort, PriceFeedPort};
use trailing_stop_engine::application::services::MonitoringScheduler;
use trailing_stop_engine::application::use_cases::{
    MonitorTrailingStopsUseCase, RegisterPositionUseCase,
};
use trailing_stop_engine::config::{Config, PersistenceBackend, load_config_or_default};
use trailing_stop_engine::domain::trailing_stop::{PositionStateStore, TrailingStopError};
use trailing_stop_engine::infrastructure::exit_sink::LoggingExitSink;
use trailing_stop_engine::infrastructure::persistence::{InMemoryStateStore, JsonFileStateStore};
use trailing_stop_engine::infrastructure::price_feed::JsonFilePriceFeed;
use trailing_stop_engine::observability::{init_metrics, init_telemetry};

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default configuration path.
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let config_path =
        std::env::var("TRAILING_STOP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    init_telemetry(&config.observability.logging)
        .map_err(|e| anyhow::anyhow!("initializing logging: {e}"))?;

    tracing::info!(config_path = %config_path, "Starting Trailing Stop Engine");

    if config.observability.metrics.enabled {
        init_metrics(&config.observability.metrics).context("starting metrics exporter")?;
    }

    let price_feed = Arc::new(JsonFilePriceFeed::new(&config.price_feed.snapshot_path));
    let exit_sink = Arc::new(LoggingExitSink);

    match config.persistence.backend {
        PersistenceBackend::JsonFile => {
            let store = JsonFileStateStore::open(&config.persistence.state_dir)
                .await
                .with_context(|| {
                    format!("opening state store at {}", config.persistence.state_dir)
                })?;
            run(&config, Arc::new(store), price_feed, exit_sink).await
        }
        PersistenceBackend::InMemory => {
            tracing::warn!("Using in-memory state store; trailing stops will not survive a restart");
            run(&config, Arc::new(InMemoryStateStore::new()), price_feed, exit_sink).await
        }
    }
}

/// Register startup positions, then run the monitor until a shutdown signal.
async fn run<S, P, E>(
    config: &Config,
    store: Arc<S>,
    price_feed: Arc<P>,
    exit_sink: Arc<E>,
) -> anyhow::Result<()>
where
    S: PositionStateStore + 'static,
    P: PriceFeedPort + 'static,
    E: ExitSinkPort + 'static,
{
    register_startup_positions(config, Arc::clone(&store)).await?;

    let monitor = Arc::new(MonitorTrailingStopsUseCase::with_settings(
        store,
        price_feed,
        exit_sink,
        config.monitor.settings(),
    ));

    let shutdown = CancellationToken::new();
    let mut scheduler =
        MonitoringScheduler::new(monitor, config.monitor.interval(), shutdown.clone()).spawn();

    tokio::select! {
        () = shutdown_signal() => {}
        result = &mut scheduler => {
            result.context("monitoring scheduler task failed")?;
            return Ok(());
        }
    }

    shutdown.cancel();
    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, scheduler).await {
        Ok(result) => {
            result.context("monitoring scheduler task failed")?;
            tracing::info!("Trailing Stop Engine stopped");
        }
        Err(_) => {
            tracing::warn!("Monitor did not stop within the shutdown timeout, undelivered exits are retried on the next start");
        }
    }

    Ok(())
}

async fn register_startup_positions<S>(config: &Config, store: Arc<S>) -> anyhow::Result<()>
where
    S: PositionStateStore,
{
    let register = RegisterPositionUseCase::with_default_config(store, config.default_trailing_stop);

    for position in &config.positions {
        match register.execute_with_defaults(position.clone()).await {
            Ok(_) => {}
            Err(TrailingStopError::AlreadyRegistered { position_id }) => {
                tracing::debug!(position_id = %position_id, "Startup position already registered");
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("registering position {}", position.id)));
            }
        }
    }

    Ok(())
}

/// Load `.env` from the working directory or the nearest ancestor.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// If a handler cannot be installed, that signal source is ignored and a
/// warning is logged; the other source still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
