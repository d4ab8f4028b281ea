//! possync Sync - Bidirectional synchronization engine
//!
//! Provides:
//! - Connection probing before every networked operation
//! - Incremental pull with per-row conflict detection
//! - Chunked push of locally modified rows
//! - A single orchestrating service with an in-progress guard
//! - An explicitly started auto-sync timer
//!
//! ## Modules
//!
//! - [`connection`] - Remote reachability check
//! - [`pull`] - Applies remote changes to the local database
//! - [`push`] - Sends dirty rows to the remote
//! - [`orchestrator`] - `SyncService`, the entry point for every command
//! - [`scheduler`] - Background auto-sync loop

pub mod connection;
pub mod orchestrator;
pub mod pull;
pub mod push;
pub mod scheduler;

use std::fmt;

use thiserror::Error;

use possync_conflict::ConflictError;
use possync_core::{domain::DomainError, ports::RemoteError};

pub use orchestrator::{SyncService, SyncSettings, SyncSummary};
pub use scheduler::{AutoSyncHandle, AutoSyncScheduler};

/// What went wrong, decided where the failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncErrorKind {
    /// Endpoint settings are missing
    Configuration,
    /// Sync is switched off
    Disabled,
    /// Another sync operation is running
    InProgress,
    /// The remote could not be reached or timed out
    Network,
    /// The remote rejected the credential
    Unauthorized,
    /// The remote answered with an error or an unreadable body
    Remote,
    /// A change could not be written locally
    Apply,
    /// No such conflict
    NotFound,
    /// The conflict was already resolved
    AlreadyResolved,
    /// A supplied value was rejected
    Validation,
    /// The local database failed
    Storage,
}

impl SyncErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorKind::Configuration => "configuration",
            SyncErrorKind::Disabled => "disabled",
            SyncErrorKind::InProgress => "in_progress",
            SyncErrorKind::Network => "network",
            SyncErrorKind::Unauthorized => "unauthorized",
            SyncErrorKind::Remote => "remote",
            SyncErrorKind::Apply => "apply",
            SyncErrorKind::NotFound => "not_found",
            SyncErrorKind::AlreadyResolved => "already_resolved",
            SyncErrorKind::Validation => "validation",
            SyncErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every `SyncService` operation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> SyncErrorKind {
        self.kind
    }
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        let kind = match e {
            RemoteError::Timeout(_) | RemoteError::Unreachable(_) => SyncErrorKind::Network,
            RemoteError::Unauthorized(_) => SyncErrorKind::Unauthorized,
            RemoteError::Status { .. } | RemoteError::InvalidResponse(_) => SyncErrorKind::Remote,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<ConflictError> for SyncError {
    fn from(e: ConflictError) -> Self {
        let kind = match e {
            ConflictError::NotFound(_) => SyncErrorKind::NotFound,
            ConflictError::AlreadyResolved(_) => SyncErrorKind::AlreadyResolved,
            ConflictError::Storage(_) => SyncErrorKind::Storage,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<DomainError> for SyncError {
    fn from(e: DomainError) -> Self {
        Self::new(SyncErrorKind::Validation, e.to_string())
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(e: anyhow::Error) -> Self {
        Self::new(SyncErrorKind::Storage, format!("{:#}", e))
    }
}
