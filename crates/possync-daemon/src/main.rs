//! possync Daemon - Background synchronization service
//!
//! This binary runs next to the POS application and handles:
//! - The D-Bus command interface for the UI
//! - Periodic `sync_full` when auto-sync is on
//! - Sync log retention
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon wires the SQLite store and the HTTP remote into a single
//! `SyncService`, exports it over D-Bus, starts the auto-sync scheduler
//! and then waits on a `CancellationToken` that is triggered on receipt of
//! SIGTERM or SIGINT.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use possync_cache::{DatabasePool, SqliteSyncStore};
use possync_core::config::{Config, LoggingConfig};
use possync_ipc::{DbusService, DBUS_NAME};
use possync_remote::{HttpRemoteService, SyncApiClient};
use possync_sync::{AutoSyncScheduler, SyncService, SyncSettings};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the config file location
const CONFIG_ENV: &str = "POSSYNC_CONFIG";

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the database pool, the sync service and the shutdown token
struct DaemonService {
    db_pool: DatabasePool,
    service: Arc<SyncService>,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the database and builds the sync service from `config`
    async fn new(config: &Config, shutdown: CancellationToken) -> Result<Self> {
        let db_pool = DatabasePool::new(&config.database.path)
            .await
            .context("Failed to open database")?;
        let store = Arc::new(SqliteSyncStore::new(db_pool.pool().clone()));

        let remote = Arc::new(HttpRemoteService::new(SyncApiClient::with_timeouts(
            Duration::from_secs(config.remote.status_timeout_secs),
            Duration::from_secs(config.remote.request_timeout_secs),
        )));

        let settings =
            SyncSettings::from_options(&config.sync).context("Invalid sync settings")?;
        info!(
            tables = settings.tables.len(),
            push_chunk_size = settings.push_chunk_size,
            "Sync settings loaded"
        );

        Ok(Self {
            db_pool,
            service: Arc::new(SyncService::new(store, remote, settings)),
            shutdown,
        })
    }

    /// Runs until the shutdown token is cancelled
    ///
    /// 1. Trims the sync log to the retention window
    /// 2. Starts the D-Bus service
    /// 3. Starts the auto-sync scheduler
    /// 4. Waits for shutdown, then stops the scheduler and closes the pool
    async fn run(&self) -> Result<()> {
        match self.service.clean_log(None).await {
            Ok(removed) => info!(removed, "Old sync log entries removed"),
            Err(e) => warn!(error = %e, "Failed to clean sync log"),
        }

        // Single instance lock via D-Bus name
        let _dbus_connection = match DbusService::try_acquire_name().await {
            Ok(false) => {
                anyhow::bail!(
                    "Another instance of possyncd is already running (D-Bus name {} is taken)",
                    DBUS_NAME
                );
            }
            Ok(true) => {
                let conn = DbusService::new(Arc::clone(&self.service))
                    .start()
                    .await
                    .context("Failed to start D-Bus service")?;
                info!("D-Bus service started, acquired name {}", DBUS_NAME);
                Some(conn)
            }
            Err(e) => {
                warn!(error = %e, "Session bus unavailable, running without D-Bus");
                None
            }
        };

        let scheduler =
            AutoSyncScheduler::start_with_token(Arc::clone(&self.service), self.shutdown.child_token());

        self.shutdown.cancelled().await;
        info!("Shutdown signal received");

        scheduler.stop().await;
        self.db_pool.close().await;

        info!("Daemon loop terminated");
        Ok(())
    }
}

// ============================================================================
// Startup helpers
// ============================================================================

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

/// Installs the global subscriber; `RUST_LOG` overrides `logging.level`
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path();
    let config = Config::load_or_default(&config_path);

    init_tracing(&config.logging);
    info!(config_path = %config_path.display(), "possync daemon starting (possyncd)");

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            error!(%problem, "Invalid configuration");
        }
        anyhow::bail!("Configuration has {} error(s)", problems.len());
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let daemon = DaemonService::new(&config, shutdown_token.clone()).await?;
    let result = daemon.run().await;

    match &result {
        Ok(()) => info!("possync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "possync daemon exiting with error"),
    }

    result
}
