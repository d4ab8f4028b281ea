//! Conflict resolution executor
//!
//! Applies a resolution by writing the chosen snapshot back to the business
//! row and closing the conflict:
//! - `Local`: the local snapshot wins and stays dirty, so the next push sends it
//! - `Remote`: the remote snapshot wins and the row is left clean

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use possync_core::{
    domain::{newtypes::ConflictId, Resolution, SyncConflict},
    ports::ISyncStore,
};

use crate::error::ConflictError;

/// Result of a batch resolution operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub resolved: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

/// Applies conflict resolutions against the local store
pub struct ConflictResolver {
    store: Arc<dyn ISyncStore>,
}

impl ConflictResolver {
    pub fn new(store: Arc<dyn ISyncStore>) -> Self {
        Self { store }
    }

    /// Resolve one conflict
    ///
    /// # Errors
    ///
    /// - `ConflictError::NotFound` if no conflict has this id
    /// - `ConflictError::AlreadyResolved` if it was resolved before, including
    ///   by a concurrent caller between the read and the write
    /// - `ConflictError::Storage` if the store fails; nothing is written then
    pub async fn resolve(
        &self,
        id: ConflictId,
        resolution: Resolution,
    ) -> Result<SyncConflict, ConflictError> {
        let conflict = self
            .store
            .get_conflict(id)
            .await?
            .ok_or_else(|| ConflictError::NotFound(id.to_string()))?;

        self.apply(conflict, resolution).await
    }

    async fn apply(
        &self,
        conflict: SyncConflict,
        resolution: Resolution,
    ) -> Result<SyncConflict, ConflictError> {
        let id = conflict
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unsaved".to_string());

        info!(
            conflict_id = %id,
            table = %conflict.table_name(),
            record_id = conflict.record_id(),
            resolution = %resolution,
            "Applying conflict resolution"
        );

        if conflict.is_resolved() {
            return Err(ConflictError::AlreadyResolved(id));
        }

        let resolved_at = Utc::now();
        let applied = self
            .store
            .apply_resolution(&conflict, resolution, resolved_at)
            .await?;
        if !applied {
            return Err(ConflictError::AlreadyResolved(id));
        }

        info!(conflict_id = %id, "Conflict resolved successfully");
        Ok(conflict.resolve(resolution, resolved_at))
    }

    /// Resolve every unresolved conflict with the same strategy
    ///
    /// Failures are counted and reported; the batch continues.
    pub async fn resolve_all(&self, resolution: Resolution) -> Result<BatchResult, ConflictError> {
        let conflicts = self.store.list_conflicts(false).await?;
        let mut result = BatchResult::default();

        for conflict in conflicts {
            match self.apply(conflict, resolution).await {
                Ok(_) => result.resolved += 1,
                Err(e) => {
                    warn!(error = %e, "Batch resolution failed for conflict");
                    result.failed += 1;
                    result.errors.push(e.to_string());
                }
            }
        }

        Ok(result)
    }
}
