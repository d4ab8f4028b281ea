//! Connection checker
//!
//! Probes `GET status` on the configured remote. The probe is read-only and
//! never fails: every problem becomes a `connected = false` status.

use std::sync::Arc;

use tracing::debug;

use possync_core::{
    domain::{ConnectionStatus, SyncConfig},
    ports::{IRemoteService, RemoteEndpoint, RemoteError, RemoteStatus},
};

use crate::{SyncError, SyncErrorKind};

/// Message returned when no API URL is configured
pub const NOT_CONFIGURED: &str = "Not configured";

pub struct ConnectionChecker {
    remote: Arc<dyn IRemoteService>,
}

impl ConnectionChecker {
    pub fn new(remote: Arc<dyn IRemoteService>) -> Self {
        Self { remote }
    }

    /// Reports whether the remote answers for `config`
    ///
    /// Without an API URL this returns immediately, without a request.
    /// `empresa_id` is not needed to probe and may still be unset.
    pub async fn check(&self, config: &SyncConfig) -> ConnectionStatus {
        let Some(api_url) = config
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        else {
            return ConnectionStatus::disconnected(NOT_CONFIGURED);
        };

        let endpoint = RemoteEndpoint {
            api_url: api_url.to_string(),
            empresa_id: config.empresa_id.unwrap_or_default(),
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
        };

        match self.remote.status(&endpoint).await {
            Ok(status) => ConnectionStatus::connected(status.server_time),
            Err(e) => {
                debug!(error = %e, "Remote not reachable");
                ConnectionStatus::disconnected(e.to_string())
            }
        }
    }

    /// Probe run before a networked sync operation
    ///
    /// # Errors
    ///
    /// `SyncErrorKind::Unauthorized` if the credential is rejected, otherwise
    /// `SyncErrorKind::Network` for any failure.
    pub async fn preflight(&self, endpoint: &RemoteEndpoint) -> Result<RemoteStatus, SyncError> {
        self.remote.status(endpoint).await.map_err(|e| match e {
            RemoteError::Unauthorized(_) => SyncError::from(e),
            other => SyncError::new(
                SyncErrorKind::Network,
                format!("Cannot reach sync server: {}", other),
            ),
        })
    }
}
