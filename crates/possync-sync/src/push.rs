//! Push engine
//!
//! Collects dirty rows from every synchronized table and sends them in
//! chunks. Rows are marked clean only after the last chunk is acknowledged;
//! a failure at any point leaves every row dirty and the watermark unmoved.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use possync_core::{
    domain::{newtypes::TableName, parse_timestamp},
    ports::{ISyncStore, IRemoteService, LocalRecord, RecordChange, RemoteEndpoint},
};

use crate::SyncError;

/// Default number of rows per `POST push`
pub const DEFAULT_PUSH_CHUNK_SIZE: usize = 500;

/// Counters for one push
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub sent_changes: u32,
}

pub struct PushEngine {
    store: Arc<dyn ISyncStore>,
    remote: Arc<dyn IRemoteService>,
    tables: Vec<TableName>,
    chunk_size: usize,
}

impl PushEngine {
    pub fn new(
        store: Arc<dyn ISyncStore>,
        remote: Arc<dyn IRemoteService>,
        tables: Vec<TableName>,
        chunk_size: usize,
    ) -> Self {
        Self {
            store,
            remote,
            tables,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Runs one push cycle
    ///
    /// With nothing dirty this returns `sent_changes = 0` without any
    /// request.
    ///
    /// # Errors
    ///
    /// Fails if reading dirty rows, any chunk, or the final bookkeeping
    /// fails. In every case no row is marked clean.
    #[tracing::instrument(skip(self, endpoint), fields(empresa_id = endpoint.empresa_id))]
    pub async fn run(&self, endpoint: &RemoteEndpoint) -> Result<PushSummary, SyncError> {
        let mut dirty: Vec<LocalRecord> = Vec::new();
        for table in &self.tables {
            let rows = self.store.dirty_records(table).await?;
            if !rows.is_empty() {
                debug!(table = %table, rows = rows.len(), "Dirty rows collected");
            }
            dirty.extend(rows);
        }

        if dirty.is_empty() {
            info!("Nothing to push");
            return Ok(PushSummary::default());
        }

        let changes: Vec<RecordChange> = dirty.iter().map(to_change).collect();
        let chunks = changes.len().div_ceil(self.chunk_size);

        for (index, chunk) in changes.chunks(self.chunk_size).enumerate() {
            let ack = self.remote.push(endpoint, chunk).await?;
            debug!(
                chunk = index + 1,
                chunks,
                rows = chunk.len(),
                accepted = ?ack.accepted,
                "Chunk acknowledged"
            );
        }

        let marked = self.store.mark_synced(&dirty).await?;
        self.store.record_push(Utc::now()).await?;

        if (marked as usize) < dirty.len() {
            debug!(
                sent = dirty.len(),
                marked,
                "Some rows changed during the push and stay dirty"
            );
        }

        info!(sent = dirty.len(), chunks, "Push complete");

        Ok(PushSummary {
            sent_changes: u32::try_from(dirty.len()).unwrap_or(u32::MAX),
        })
    }
}

fn to_change(record: &LocalRecord) -> RecordChange {
    RecordChange {
        table_name: record.table_name.to_string(),
        record_id: record.record_id,
        data: record.data.clone(),
        updated_at: record.updated_at.as_deref().and_then(parse_timestamp),
    }
}
