//! Remote service port (driven/secondary port)
//!
//! This module defines the interface to the cloud sync API: a status probe,
//! an incremental pull and a batched push, all scoped to one tenant.
//!
//! ## Design Notes
//!
//! - Errors are a closed [`RemoteError`] enum rather than `anyhow::Error`:
//!   the orchestrator maps each variant to a `SyncErrorKind`, so the
//!   classification has to be made where the failure is observed.
//! - The endpoint is passed on every call because `SyncConfig` can be
//!   changed at runtime through `sync-configure`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::record::Record;

// ============================================================================
// Wire types
// ============================================================================

/// Where and as whom to talk to the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    /// Base URL as configured (normalized by the adapter)
    pub api_url: String,
    pub empresa_id: i64,
    /// Sent as `Authorization: Bearer ...` when present
    pub auth_token: Option<String>,
}

/// Response of `GET status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStatus {
    #[serde(default)]
    pub server_time: Option<DateTime<Utc>>,
}

/// One changed row, in either direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordChange {
    pub table_name: String,
    pub record_id: i64,
    pub data: Record,
    /// Last-modified time on the side that produced the change
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response of `GET pull`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    #[serde(default)]
    pub changes: Vec<RecordChange>,
    /// Server clock when the page was produced; becomes the next `since`
    #[serde(default)]
    pub server_time: Option<DateTime<Utc>>,
}

/// Response of `POST push`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAck {
    #[serde(default)]
    pub accepted: Option<u64>,
}

// ============================================================================
// Errors
// ============================================================================

/// Failures talking to the remote, classified at the point of failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The request did not complete within its timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// DNS failure, connection refused, TLS error, reset...
    #[error("Network error: {0}")]
    Unreachable(String),

    /// The remote rejected the credential (401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-2xx response
    #[error("Remote returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The body could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Port
// ============================================================================

/// Port for the cloud sync API
#[async_trait]
pub trait IRemoteService: Send + Sync {
    /// Probes reachability and credentials
    async fn status(&self, endpoint: &RemoteEndpoint) -> Result<RemoteStatus, RemoteError>;

    /// Fetches changes newer than `since` (all changes when `None`)
    async fn pull(
        &self,
        endpoint: &RemoteEndpoint,
        since: Option<&str>,
    ) -> Result<PullResponse, RemoteError>;

    /// Sends one batch of local changes; the remote upserts by id
    async fn push(
        &self,
        endpoint: &RemoteEndpoint,
        changes: &[RecordChange],
    ) -> Result<PushAck, RemoteError>;
}
