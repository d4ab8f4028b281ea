//! Sync orchestrator
//!
//! [`SyncService`] is the single entry point for every sync command. It owns
//! the engines, checks preconditions, keeps the summary log entry for each
//! run and makes sure only one mutating operation runs at a time.
//!
//! ## Preconditions
//!
//! Checked in order, after the in-progress guard was taken:
//!
//! 1. The configuration is enabled (`Disabled` otherwise)
//! 2. `api_url` and `empresa_id` are set (`Configuration`, "Not configured")
//! 3. For full and pull only, the status probe succeeds (`Network`)
//!
//! Each failure is written to the log as an `error` entry. A call rejected
//! by the guard writes nothing.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{Duration, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use possync_audit::SyncLogger;
use possync_conflict::{BatchResult, ConflictResolver};
use possync_core::{
    config::SyncOptions,
    domain::{
        newtypes::{ConflictId, TableName},
        ConnectionStatus, DomainError, Resolution, SyncConfig, SyncConfigUpdate, SyncConflict,
        SyncLogEntry, SyncStats, SyncStatus, SyncType,
    },
    ports::{ISyncStore, IRemoteService, RemoteEndpoint},
};

use crate::{
    connection::{ConnectionChecker, NOT_CONFIGURED},
    pull::{PullEngine, PullSummary},
    push::{PushEngine, PushSummary, DEFAULT_PUSH_CHUNK_SIZE},
    SyncError, SyncErrorKind,
};

/// Log operation of a full sync
pub const FULL_OPERATION: &str = "pull+push";

/// Log operation of a pull
pub const PULL_OPERATION: &str = "pull";

/// Log operation of a push
pub const PUSH_OPERATION: &str = "push";

/// Entries returned by `get_log` when no limit is given
pub const DEFAULT_LOG_LIMIT: u32 = 50;

/// Age in days past which `clean_log` deletes entries when none is given
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 30;

// ============================================================================
// Settings and results
// ============================================================================

/// Engine settings taken from the application config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Business tables that take part in synchronization
    pub tables: Vec<TableName>,
    /// Rows per `POST push`
    pub push_chunk_size: usize,
    /// Default age for `clean_log`
    pub log_retention_days: u32,
}

impl SyncSettings {
    /// Builds settings from the `sync` config section
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidIdentifier` for a table name that is not
    /// a plain SQL identifier.
    pub fn from_options(options: &SyncOptions) -> Result<Self, DomainError> {
        let tables = options
            .tables
            .iter()
            .map(|t| TableName::new(t.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tables,
            push_chunk_size: options.push_chunk_size.max(1),
            log_retention_days: options.log_retention_days,
        })
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        let options = SyncOptions::default();
        Self {
            tables: options
                .tables
                .iter()
                .filter_map(|t| TableName::new(t.as_str()).ok())
                .collect(),
            push_chunk_size: DEFAULT_PUSH_CHUNK_SIZE,
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
        }
    }
}

/// Result of `sync_full`, `sync_pull` or `sync_push`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub applied_changes: u32,
    pub conflicts: u32,
    pub skipped: u32,
    pub sent_changes: u32,
    pub errors: Vec<String>,
}

impl SyncSummary {
    fn from_phases(
        sync_type: SyncType,
        pull: Option<PullSummary>,
        push: Option<PushSummary>,
    ) -> Self {
        let pull = pull.unwrap_or_default();
        let push = push.unwrap_or_default();
        Self {
            sync_type,
            status: pull.status(),
            applied_changes: pull.applied_changes,
            conflicts: pull.conflicts,
            skipped: pull.skipped,
            sent_changes: push.sent_changes,
            errors: pull.errors,
        }
    }

    /// One-line text stored with the summary log entry
    pub fn describe(&self) -> String {
        format!(
            "applied {}, conflicts {}, skipped {}, sent {}, errors {}",
            self.applied_changes,
            self.conflicts,
            self.skipped,
            self.sent_changes,
            self.errors.len()
        )
    }
}

// ============================================================================
// In-progress guard
// ============================================================================

/// Holds the in-progress flag until dropped
struct InProgressGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InProgressGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ============================================================================
// SyncService
// ============================================================================

/// The sync orchestrator
///
/// Construct once at startup and share behind an `Arc`.
pub struct SyncService {
    store: Arc<dyn ISyncStore>,
    settings: SyncSettings,
    logger: Arc<SyncLogger>,
    checker: ConnectionChecker,
    pull: PullEngine,
    push: PushEngine,
    resolver: ConflictResolver,
    in_progress: AtomicBool,
    config_changed: Arc<Notify>,
}

impl SyncService {
    /// Creates a new SyncService
    ///
    /// # Arguments
    /// * `store` - Local database adapter
    /// * `remote` - Cloud API adapter
    /// * `settings` - Tables, chunk size and log retention
    pub fn new(
        store: Arc<dyn ISyncStore>,
        remote: Arc<dyn IRemoteService>,
        settings: SyncSettings,
    ) -> Self {
        let logger = Arc::new(SyncLogger::new(Arc::clone(&store)));

        Self {
            checker: ConnectionChecker::new(Arc::clone(&remote)),
            pull: PullEngine::new(
                Arc::clone(&store),
                Arc::clone(&remote),
                Arc::clone(&logger),
                settings.tables.clone(),
            ),
            push: PushEngine::new(
                Arc::clone(&store),
                remote,
                settings.tables.clone(),
                settings.push_chunk_size,
            ),
            resolver: ConflictResolver::new(Arc::clone(&store)),
            store,
            settings,
            logger,
            in_progress: AtomicBool::new(false),
            config_changed: Arc::new(Notify::new()),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// True while a full, pull or push is running
    pub fn is_syncing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Signalled every time `configure` saves a new configuration
    pub fn config_changes(&self) -> Arc<Notify> {
        Arc::clone(&self.config_changed)
    }

    /// Current configuration, defaults before first setup
    pub async fn load_config(&self) -> Result<SyncConfig, SyncError> {
        Ok(self.store.get_config().await?.unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Mutating operations
    // ------------------------------------------------------------------

    /// Pull then push as one logged attempt
    ///
    /// The push is skipped when the pull fails.
    #[tracing::instrument(skip(self))]
    pub async fn sync_full(&self) -> Result<SyncSummary, SyncError> {
        let _guard = self.acquire()?;
        let endpoint = self.prepare(SyncType::Full, FULL_OPERATION, true).await?;

        info!("Starting full sync");
        let log_id = self.logger.begin(SyncType::Full, FULL_OPERATION).await;

        let pull = match self.pull.run(&endpoint, SyncType::Full).await {
            Ok(summary) => summary,
            Err(e) => {
                self.logger
                    .finish(log_id, SyncStatus::Error, Some(&format!("pull failed: {}", e)))
                    .await;
                return Err(e);
            }
        };

        let push = match self.push.run(&endpoint).await {
            Ok(summary) => summary,
            Err(e) => {
                let message = format!(
                    "push failed after applying {} changes: {}",
                    pull.applied_changes, e
                );
                self.logger
                    .finish(log_id, SyncStatus::Error, Some(&message))
                    .await;
                return Err(e);
            }
        };

        let summary = SyncSummary::from_phases(SyncType::Full, Some(pull), Some(push));
        self.logger
            .finish(log_id, summary.status, Some(&summary.describe()))
            .await;

        info!(
            applied = summary.applied_changes,
            conflicts = summary.conflicts,
            sent = summary.sent_changes,
            "Full sync complete"
        );
        Ok(summary)
    }

    /// Applies remote changes only
    #[tracing::instrument(skip(self))]
    pub async fn sync_pull(&self) -> Result<SyncSummary, SyncError> {
        let _guard = self.acquire()?;
        let endpoint = self.prepare(SyncType::Pull, PULL_OPERATION, true).await?;

        let log_id = self.logger.begin(SyncType::Pull, PULL_OPERATION).await;

        match self.pull.run(&endpoint, SyncType::Pull).await {
            Ok(pull) => {
                let summary = SyncSummary::from_phases(SyncType::Pull, Some(pull), None);
                self.logger
                    .finish(log_id, summary.status, Some(&summary.describe()))
                    .await;
                Ok(summary)
            }
            Err(e) => {
                self.logger
                    .finish(log_id, SyncStatus::Error, Some(&e.message))
                    .await;
                Err(e)
            }
        }
    }

    /// Sends local changes only
    ///
    /// No connection probe runs first; a failed push reports the network
    /// error itself.
    #[tracing::instrument(skip(self))]
    pub async fn sync_push(&self) -> Result<SyncSummary, SyncError> {
        let _guard = self.acquire()?;
        let endpoint = self.prepare(SyncType::Push, PUSH_OPERATION, false).await?;

        let log_id = self.logger.begin(SyncType::Push, PUSH_OPERATION).await;

        match self.push.run(&endpoint).await {
            Ok(push) => {
                let summary = SyncSummary::from_phases(SyncType::Push, None, Some(push));
                self.logger
                    .finish(log_id, summary.status, Some(&summary.describe()))
                    .await;
                Ok(summary)
            }
            Err(e) => {
                self.logger
                    .finish(log_id, SyncStatus::Error, Some(&e.message))
                    .await;
                Err(e)
            }
        }
    }

    fn acquire(&self) -> Result<InProgressGuard<'_>, SyncError> {
        InProgressGuard::acquire(&self.in_progress).ok_or_else(|| {
            debug!("Sync already in progress, rejecting");
            SyncError::new(SyncErrorKind::InProgress, "A sync operation is already in progress")
        })
    }

    /// Checks the preconditions, logging any failure as an error entry
    async fn prepare(
        &self,
        sync_type: SyncType,
        operation: &str,
        probe: bool,
    ) -> Result<RemoteEndpoint, SyncError> {
        let result = self.check_preconditions(probe).await;
        if let Err(ref e) = result {
            warn!(kind = %e.kind, error = %e, operation, "Sync precondition failed");
            self.logger
                .record_failure(sync_type, operation, &e.message)
                .await;
        }
        result
    }

    async fn check_preconditions(&self, probe: bool) -> Result<RemoteEndpoint, SyncError> {
        let config = self.load_config().await?;

        if !config.enabled {
            return Err(SyncError::new(SyncErrorKind::Disabled, "Sync is disabled"));
        }

        let endpoint = config
            .endpoint()
            .map_err(|_| SyncError::new(SyncErrorKind::Configuration, NOT_CONFIGURED))?;

        if probe {
            self.checker.preflight(&endpoint).await?;
        }

        Ok(endpoint)
    }

    // ------------------------------------------------------------------
    // Read-side operations
    // ------------------------------------------------------------------

    /// Probes the remote; never fails
    pub async fn check_connection(&self) -> ConnectionStatus {
        match self.load_config().await {
            Ok(config) => self.checker.check(&config).await,
            Err(e) => ConnectionStatus::disconnected(e.message),
        }
    }

    /// Dashboard numbers
    pub async fn get_stats(&self) -> Result<SyncStats, SyncError> {
        let config = self.load_config().await?;
        let last_sync = self.store.last_completed_sync().await?;

        let mut pending_changes = 0;
        for table in &self.settings.tables {
            pending_changes += self.store.count_dirty(table).await?;
        }

        Ok(SyncStats {
            last_sync,
            pending_changes,
            unresolved_conflicts: self.store.count_unresolved_conflicts().await?,
            auto_sync_enabled: config.auto_sync,
            sync_interval: config.sync_interval,
        })
    }

    /// Most recent log entries, newest first (50 by default)
    pub async fn get_log(&self, limit: Option<u32>) -> Result<Vec<SyncLogEntry>, SyncError> {
        Ok(self
            .store
            .recent_log(limit.unwrap_or(DEFAULT_LOG_LIMIT))
            .await?)
    }

    /// Deletes log entries older than `days` (the configured retention by default)
    pub async fn clean_log(&self, days: Option<u32>) -> Result<u64, SyncError> {
        let days = days.unwrap_or(self.settings.log_retention_days);
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let removed = self.store.delete_log_before(cutoff).await?;
        info!(days, removed, "Sync log cleaned");
        Ok(removed)
    }

    /// Applies a partial configuration update
    ///
    /// Returns the saved configuration with the token masked.
    ///
    /// # Errors
    ///
    /// `SyncErrorKind::Validation` if the merged configuration is invalid;
    /// nothing is saved then.
    pub async fn configure(&self, update: SyncConfigUpdate) -> Result<SyncConfig, SyncError> {
        let next = self.load_config().await?.merged(update);
        next.validate()?;
        self.store.save_config(&next).await?;

        info!(
            api_url = ?next.api_url,
            empresa_id = ?next.empresa_id,
            auto_sync = next.auto_sync,
            sync_interval = next.sync_interval,
            enabled = next.enabled,
            "Sync configuration saved"
        );
        self.config_changed.notify_one();

        Ok(next.redacted())
    }

    /// Current configuration with the token masked
    pub async fn get_config(&self) -> Result<SyncConfig, SyncError> {
        Ok(self.load_config().await?.redacted())
    }

    // ------------------------------------------------------------------
    // Conflicts
    // ------------------------------------------------------------------

    pub async fn get_conflicts(&self, include_resolved: bool) -> Result<Vec<SyncConflict>, SyncError> {
        Ok(self.store.list_conflicts(include_resolved).await?)
    }

    pub async fn resolve_conflict(
        &self,
        id: ConflictId,
        resolution: Resolution,
    ) -> Result<SyncConflict, SyncError> {
        Ok(self.resolver.resolve(id, resolution).await?)
    }

    /// Resolves every open conflict the same way
    pub async fn resolve_all_conflicts(&self, resolution: Resolution) -> Result<BatchResult, SyncError> {
        Ok(self.resolver.resolve_all(resolution).await?)
    }
}
