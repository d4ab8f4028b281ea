//! Auto-sync scheduler
//!
//! A background task that runs `sync_full` every `sync_interval` seconds
//! while `auto_sync && enabled`. The task re-reads the configuration after
//! every cycle and whenever `configure` signals a change, so a new interval
//! or switching auto-sync off takes effect without a restart.
//!
//! ## Flow
//!
//! ```text
//!            ┌──── config_changes ────┐
//!            ▼                        │
//! load config ──→ sleep(interval) ──→ sync_full ──┐
//!      ▲                                          │
//!      └──────────────────────────────────────────┘
//! ```
//!
//! A cycle in progress is never interrupted; `stop` takes effect between
//! cycles.

use std::{sync::Arc, time::Duration};

use tokio::{sync::Notify, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{SyncErrorKind, SyncService};

/// Handle to a running auto-sync task
pub struct AutoSyncHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl AutoSyncHandle {
    /// True until the task has exited
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the loop and waits for it to exit
    ///
    /// If a cycle is running it completes first.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Auto-sync task ended abnormally");
        }
    }
}

pub struct AutoSyncScheduler;

impl AutoSyncScheduler {
    /// Spawns the auto-sync loop
    pub fn start(service: Arc<SyncService>) -> AutoSyncHandle {
        Self::start_with_token(service, CancellationToken::new())
    }

    /// Spawns the auto-sync loop under an existing cancellation token
    ///
    /// Used by the daemon so that its shutdown token also stops the loop.
    pub fn start_with_token(service: Arc<SyncService>, token: CancellationToken) -> AutoSyncHandle {
        let changes = service.config_changes();
        let task = tokio::spawn(run_loop(service, token.clone(), changes));
        AutoSyncHandle { token, task }
    }
}

async fn run_loop(service: Arc<SyncService>, token: CancellationToken, changes: Arc<Notify>) {
    info!("Auto-sync scheduler started");

    loop {
        let interval = match service.load_config().await {
            Ok(config) if config.auto_sync && config.enabled => {
                Some(Duration::from_secs(config.sync_interval.max(1)))
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read sync configuration, auto-sync idle");
                None
            }
        };

        let Some(interval) = interval else {
            debug!("Auto-sync off, waiting for a configuration change");
            tokio::select! {
                _ = token.cancelled() => break,
                _ = changes.notified() => continue,
            }
        };

        debug!(interval_secs = interval.as_secs(), "Next auto-sync scheduled");
        tokio::select! {
            _ = token.cancelled() => break,
            _ = changes.notified() => {
                debug!("Sync configuration changed, rescheduling");
                continue;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match service.sync_full().await {
            Ok(summary) => {
                info!(
                    applied = summary.applied_changes,
                    conflicts = summary.conflicts,
                    sent = summary.sent_changes,
                    "Auto-sync cycle completed"
                );
            }
            Err(e) if e.kind == SyncErrorKind::InProgress => {
                debug!("Auto-sync skipped, another sync is running");
            }
            Err(e) => {
                warn!(kind = %e.kind, error = %e, "Auto-sync cycle failed");
            }
        }
    }

    info!("Auto-sync scheduler stopped");
}
