//! Horizon - real-time server dashboard backend
//!
//! Main entry point: loads configuration, opens the server store and serves
//! the WebSocket push channel until interrupted.

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use horizon_config::{ConfigLoader, ConfigValidator, LoggingConfig};
use horizon_realtime::{RealtimeServer, RealtimeState, ServerDirectory};
use horizon_store_sqlite::SqliteServerStore;

use cli::Cli;

/// Initialize tracing with a console layer and, when a log directory is
/// configured, a daily-rolling file layer.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let file_layer = match &logging.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("horizon")
                .filename_suffix("log")
                .max_log_files(14)
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Keep the writer alive for the life of the process
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(file_layer)
        .init();

    Ok(())
}

/// Push the full server list to every client on SIGHUP, so rows edited
/// directly in the database reach open dashboards.
#[cfg(unix)]
fn spawn_resync_on_hangup(directory: ServerDirectory, shutdown: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!("Failed to listen for SIGHUP, resync disabled: {}", e);
            return;
        }
    };
    let triggers = futures::stream::unfold(hangup, |mut hangup| async move {
        hangup.recv().await.map(|()| ((), hangup))
    });

    tokio::spawn(async move {
        directory.resync_on(Box::pin(triggers), shutdown).await;
    });
}

#[cfg(not(unix))]
fn spawn_resync_on_hangup(_directory: ServerDirectory, _shutdown: CancellationToken) {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);

    init_tracing(&config.logging)?;

    let validation = ConfigValidator::validate(&config);
    for warning in &validation.warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    if !validation.is_valid() {
        let problems: Vec<String> = validation
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect();
        bail!("invalid configuration: {}", problems.join("; "));
    }

    let db_path = ConfigLoader::expand_path(&config.store.path);
    if let Some(parent) = Path::new(&db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating store directory {}", parent.display()))?;
    }
    let store = Arc::new(
        SqliteServerStore::open(&db_path)
            .await
            .with_context(|| format!("opening server store {}", db_path))?,
    );
    info!(path = %db_path, "Server store ready");

    let shutdown = CancellationToken::new();
    let state = Arc::new(RealtimeState::with_shutdown(
        store.clone(),
        config.realtime.clone(),
        shutdown.clone(),
    ));

    let directory = ServerDirectory::new(store, state.publisher.clone());
    spawn_resync_on_hangup(directory, shutdown.clone());

    let addr = config.server.address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                warn!("Failed to listen for shutdown signal: {}", e);
                return;
            }
        }
        shutdown.cancel();
    });

    RealtimeServer::new(state).run(listener).await?;

    info!("Horizon stopped");
    Ok(())
}
