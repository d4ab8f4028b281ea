//! Remote sync endpoint configuration
//!
//! [`SyncConfig`] is the singleton row in `sync_config`. It is edited through
//! the `sync-configure` command and read before every sync operation. The
//! file-based application settings live in [`crate::config`] instead.

use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::DomainError;
use crate::ports::remote_service::RemoteEndpoint;

/// Default seconds between automatic syncs
pub const DEFAULT_SYNC_INTERVAL: u64 = 300;

/// Shortest accepted auto-sync interval in seconds
pub const MIN_SYNC_INTERVAL: u64 = 60;

/// Longest accepted auto-sync interval in seconds
pub const MAX_SYNC_INTERVAL: u64 = 3600;

/// Remote endpoint and scheduling settings for one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the remote sync API
    pub api_url: Option<String>,
    /// Tenant ("empresa") identifier sent with every request
    pub empresa_id: Option<i64>,
    /// Bearer credential
    pub auth_token: Option<String>,
    /// Whether the background timer runs `sync_full`
    pub auto_sync: bool,
    /// Seconds between automatic syncs
    pub sync_interval: u64,
    /// Master switch for every sync operation
    pub enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            empresa_id: None,
            auth_token: None,
            auto_sync: false,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            enabled: true,
        }
    }
}

impl SyncConfig {
    /// Returns true when an API URL is present
    pub fn has_api_url(&self) -> bool {
        self.api_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// Builds the endpoint used by the remote adapter
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotConfigured` if `api_url` or `empresa_id` is missing.
    pub fn endpoint(&self) -> Result<RemoteEndpoint, DomainError> {
        let api_url = match self.api_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => return Err(DomainError::NotConfigured("api_url is not set".into())),
        };
        let empresa_id = self
            .empresa_id
            .ok_or_else(|| DomainError::NotConfigured("empresa_id is not set".into()))?;

        Ok(RemoteEndpoint {
            api_url,
            empresa_id,
            auth_token: self.auth_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Checks field ranges and the URL format
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(MIN_SYNC_INTERVAL..=MAX_SYNC_INTERVAL).contains(&self.sync_interval) {
            return Err(DomainError::ValidationFailed(format!(
                "sync_interval must be between {} and {} seconds, got {}",
                MIN_SYNC_INTERVAL, MAX_SYNC_INTERVAL, self.sync_interval
            )));
        }

        if let Some(raw) = self.api_url.as_deref().filter(|u| !u.trim().is_empty()) {
            let parsed =
                Url::parse(raw.trim()).map_err(|e| DomainError::InvalidUrl(format!("{raw}: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(DomainError::InvalidUrl(format!(
                    "{raw}: scheme must be http or https"
                )));
            }
        }

        if let Some(id) = self.empresa_id {
            if id <= 0 {
                return Err(DomainError::ValidationFailed(format!(
                    "empresa_id must be positive, got {id}"
                )));
            }
        }

        Ok(())
    }

    /// Returns a copy of this configuration with `update` applied
    pub fn merged(&self, update: SyncConfigUpdate) -> Self {
        let mut next = self.clone();
        if let Some(url) = update.api_url {
            next.api_url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(id) = update.empresa_id {
            next.empresa_id = Some(id);
        }
        if let Some(token) = update.auth_token {
            next.auth_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(auto) = update.auto_sync {
            next.auto_sync = auto;
        }
        if let Some(interval) = update.sync_interval {
            next.sync_interval = interval;
        }
        if let Some(enabled) = update.enabled {
            next.enabled = enabled;
        }
        next
    }

    /// Returns a copy safe to hand to UI clients, with the token hidden
    pub fn redacted(&self) -> Self {
        Self {
            auth_token: self.auth_token.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }
}

/// Partial update accepted by `sync-configure`
///
/// Absent fields keep their current value. An empty `api_url` or
/// `auth_token` clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfigUpdate {
    pub api_url: Option<String>,
    pub empresa_id: Option<i64>,
    pub auth_token: Option<String>,
    pub auto_sync: Option<bool>,
    pub sync_interval: Option<u64>,
    pub enabled: Option<bool>,
}
