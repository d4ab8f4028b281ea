//! Shared command context: configuration plus a lazily opened service

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tracing::debug;

use possync_cache::{DatabasePool, SqliteSyncStore};
use possync_core::config::Config;
use possync_remote::{HttpRemoteService, SyncApiClient};
use possync_sync::{SyncService, SyncSettings};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

pub struct AppContext {
    pub config_path: PathBuf,
    pub config: Config,
    pub format: OutputFormat,
}

impl AppContext {
    /// Loads the application config from `config_path` or the default location
    pub fn load(config_path: Option<PathBuf>, format: OutputFormat) -> Self {
        let config_path = config_path.unwrap_or_else(Config::default_path);
        let config = Config::load_or_default(&config_path);
        debug!(config_path = %config_path.display(), "Loaded configuration");
        Self {
            config_path,
            config,
            format,
        }
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format)
    }

    /// Opens the POS database and builds a `SyncService` over it
    ///
    /// The database is created if it does not exist yet.
    pub async fn open_service(&self) -> Result<Arc<SyncService>> {
        let pool = DatabasePool::new(&self.config.database.path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database {}",
                    self.config.database.path.display()
                )
            })?;
        let store = Arc::new(SqliteSyncStore::new(pool.pool().clone()));

        let remote = Arc::new(HttpRemoteService::new(SyncApiClient::with_timeouts(
            Duration::from_secs(self.config.remote.status_timeout_secs),
            Duration::from_secs(self.config.remote.request_timeout_secs),
        )));

        let settings =
            SyncSettings::from_options(&self.config.sync).context("Invalid sync settings")?;

        Ok(Arc::new(SyncService::new(store, remote, settings)))
    }
}
