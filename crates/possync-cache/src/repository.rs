//! SQLite implementation of ISyncStore
//!
//! Concrete storage for the sync metadata tables plus schema-agnostic access
//! to the business tables the POS application owns.
//!
//! ## Type Mapping
//!
//! | Domain Type            | SQL Type | Strategy                                  |
//! |------------------------|----------|-------------------------------------------|
//! | ConflictId, LogEntryId | INTEGER  | `AUTOINCREMENT` rowid                      |
//! | DateTime<Utc>          | TEXT     | `format_timestamp` (RFC 3339, millis, Z)   |
//! | SyncType, SyncStatus   | TEXT     | `as_str()` / `FromStr`                     |
//! | Resolution             | TEXT     | `local` / `remote`                         |
//! | Record (snapshots)     | TEXT     | JSON object                                |
//! | bool                   | INTEGER  | 0 / 1                                      |
//!
//! ## Business rows
//!
//! Business tables are read with `SELECT *` and decoded column by column
//! from SQLite's dynamic type: INTEGER and REAL become JSON numbers, TEXT a
//! string, BLOB a base64 string. Writes bind JSON values back the same way;
//! booleans become 0/1 and nested arrays/objects are stored as JSON text.
//! Table names arrive as validated [`TableName`]s and column names are only
//! ever taken from `PRAGMA table_info`, so nothing caller-supplied reaches
//! the SQL text unchecked.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::{Number, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Executor, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};
use tracing::debug;

use possync_core::domain::{
    format_timestamp,
    newtypes::{ConflictId, LogEntryId, TableName},
    record::{SYNCED_AT_COLUMN, UPDATED_AT_COLUMN},
    sync_config::DEFAULT_SYNC_INTERVAL,
    Record, Resolution, SyncConfig, SyncConflict, SyncLogEntry, SyncState, SyncStatus, SyncType,
    PRIMARY_KEY_COLUMN, TRACKING_COLUMNS,
};
use possync_core::ports::{ISyncStore, LocalRecord};

use crate::CacheError;

/// SQLite-based implementation of the sync store port
pub struct SqliteSyncStore {
    pool: SqlitePool,
}

impl SqliteSyncStore {
    /// Creates a new store over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Parse a DateTime<Utc> from the stored text
///
/// Accepts RFC 3339 (what the engine writes) and SQLite's
/// `datetime('now')` format (what the POS application tends to write).
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, CacheError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

/// Double-quotes an identifier that has already been validated
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Binds a JSON value as the closest SQLite storage class
fn bind_json<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        nested => query.bind(nested.to_string()),
    }
}

/// Decodes one column of a business row by its dynamic SQLite type
fn column_value(row: &SqliteRow, idx: usize) -> Result<Value, CacheError> {
    let type_name = {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };

    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => Value::from(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" | "NUMERIC" => {
            let f: f64 = row.try_get_unchecked(idx)?;
            Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
        }
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get_unchecked(idx)?;
            Value::String(BASE64.encode(bytes))
        }
        _ => Value::String(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(value)
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn local_record_from_row(table: &TableName, row: &SqliteRow) -> Result<LocalRecord, CacheError> {
    let mut data = Record::new();
    let mut updated_at = None;
    let mut synced_at = None;

    for column in row.columns() {
        let value = column_value(row, column.ordinal())?;
        match column.name() {
            UPDATED_AT_COLUMN => updated_at = text_of(&value),
            SYNCED_AT_COLUMN => synced_at = text_of(&value),
            name => {
                data.insert(name, value);
            }
        }
    }

    let record_id = data
        .get(PRIMARY_KEY_COLUMN)
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            CacheError::SerializationError(format!("Row in {} has no integer id", table))
        })?;

    Ok(LocalRecord {
        table_name: table.clone(),
        record_id,
        data,
        updated_at,
        synced_at,
    })
}

fn config_from_row(row: &SqliteRow) -> SyncConfig {
    let auto_sync: i64 = row.get("auto_sync");
    let sync_interval: i64 = row.get("sync_interval");
    let enabled: i64 = row.get("enabled");

    SyncConfig {
        api_url: row.get("api_url"),
        empresa_id: row.get("empresa_id"),
        auth_token: row.get("auth_token"),
        auto_sync: auto_sync != 0,
        sync_interval: u64::try_from(sync_interval).unwrap_or(DEFAULT_SYNC_INTERVAL),
        enabled: enabled != 0,
    }
}

fn log_entry_from_row(row: &SqliteRow) -> Result<SyncLogEntry, CacheError> {
    let id: i64 = row.get("id");
    let sync_type_str: String = row.get("sync_type");
    let table_name: Option<String> = row.get("table_name");
    let operation: String = row.get("operation");
    let status_str: String = row.get("status");
    let error_message: Option<String> = row.get("error_message");
    let started_at_str: String = row.get("started_at");

    let sync_type: SyncType = sync_type_str
        .parse()
        .map_err(|e| CacheError::SerializationError(format!("{}", e)))?;
    let status: SyncStatus = status_str
        .parse()
        .map_err(|e| CacheError::SerializationError(format!("{}", e)))?;

    let mut entry = SyncLogEntry::new(sync_type, operation)
        .with_id(LogEntryId::new(id))
        .with_status(status)
        .with_started_at(parse_datetime(&started_at_str)?);
    if let Some(table) = table_name {
        entry = entry.with_table(table);
    }
    if let Some(message) = error_message {
        entry = entry.with_message(message);
    }
    Ok(entry)
}

fn conflict_from_row(row: &SqliteRow) -> Result<SyncConflict, CacheError> {
    let id: i64 = row.get("id");
    let table_name: String = row.get("table_name");
    let record_id: i64 = row.get("record_id");
    let local_data_str: String = row.get("local_data");
    let remote_data_str: String = row.get("remote_data");
    let resolved: i64 = row.get("resolved");
    let resolution_str: Option<String> = row.get("resolution");
    let created_at_str: String = row.get("created_at");
    let resolved_at_str: Option<String> = row.get("resolved_at");

    let local_data = Record::from_json_str(&local_data_str)
        .map_err(|e| CacheError::SerializationError(format!("local_data: {}", e)))?;
    let remote_data = Record::from_json_str(&remote_data_str)
        .map_err(|e| CacheError::SerializationError(format!("remote_data: {}", e)))?;
    let created_at = parse_datetime(&created_at_str)?;

    let conflict = SyncConflict::new(table_name, record_id, local_data, remote_data)
        .with_id(ConflictId::new(id))
        .with_created_at(created_at);

    if resolved == 0 {
        return Ok(conflict);
    }

    let resolution: Resolution = resolution_str
        .as_deref()
        .ok_or_else(|| {
            CacheError::SerializationError(format!("Conflict {} resolved without resolution", id))
        })?
        .parse()
        .map_err(|e| CacheError::SerializationError(format!("{}", e)))?;
    let resolved_at = parse_optional_datetime(resolved_at_str)?.unwrap_or(created_at);

    Ok(conflict.resolve(resolution, resolved_at))
}

// ============================================================================
// Business table introspection
// ============================================================================

/// Column names of a business table, checked for sync support
struct TableShape {
    columns: HashSet<String>,
}

impl TableShape {
    fn has(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Data columns of `record` this table can store, primary key excluded
    fn writable_columns<'a>(&self, record: &'a Record) -> Vec<&'a str> {
        record
            .columns()
            .filter(|c| *c != PRIMARY_KEY_COLUMN && !TRACKING_COLUMNS.contains(c) && self.has(c))
            .collect()
    }
}

async fn table_shape<'e, E>(executor: E, table: &TableName) -> Result<TableShape, CacheError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("PRAGMA table_info({})", quote_ident(table.as_str()));
    let rows = sqlx::query(&sql).fetch_all(executor).await?;
    let columns: HashSet<String> = rows.iter().map(|r| r.get::<String, _>("name")).collect();

    if columns.is_empty() {
        return Err(CacheError::UnsupportedTable {
            table: table.to_string(),
            reason: "table does not exist".into(),
        });
    }
    for required in [PRIMARY_KEY_COLUMN, UPDATED_AT_COLUMN, SYNCED_AT_COLUMN] {
        if !columns.contains(required) {
            return Err(CacheError::UnsupportedTable {
                table: table.to_string(),
                reason: format!("missing column {}", required),
            });
        }
    }

    Ok(TableShape { columns })
}

// ============================================================================
// ISyncStore implementation
// ============================================================================

#[async_trait]
impl ISyncStore for SqliteSyncStore {
    // ------------------------------------------------------------------
    // Configuration and watermarks
    // ------------------------------------------------------------------

    async fn get_config(&self) -> Result<Option<SyncConfig>> {
        let row = sqlx::query(
            "SELECT api_url, empresa_id, auth_token, auto_sync, sync_interval, enabled \
             FROM sync_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load sync configuration")?;

        Ok(row.as_ref().map(config_from_row))
    }

    async fn save_config(&self, config: &SyncConfig) -> Result<()> {
        let sync_interval = i64::try_from(config.sync_interval).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO sync_config \
                (id, api_url, empresa_id, auth_token, auto_sync, sync_interval, enabled, updated_at) \
             VALUES (1, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                api_url = excluded.api_url, \
                empresa_id = excluded.empresa_id, \
                auth_token = excluded.auth_token, \
                auto_sync = excluded.auto_sync, \
                sync_interval = excluded.sync_interval, \
                enabled = excluded.enabled, \
                updated_at = excluded.updated_at",
        )
        .bind(&config.api_url)
        .bind(config.empresa_id)
        .bind(&config.auth_token)
        .bind(i64::from(config.auto_sync))
        .bind(sync_interval)
        .bind(i64::from(config.enabled))
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .context("Failed to save sync configuration")?;

        Ok(())
    }

    async fn get_state(&self) -> Result<SyncState> {
        let row = sqlx::query(
            "SELECT last_pull_at, pull_cursor, last_push_at FROM sync_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load sync watermarks")?;

        let Some(row) = row else {
            return Ok(SyncState::default());
        };

        Ok(SyncState {
            last_pull_at: parse_optional_datetime(row.get("last_pull_at"))?,
            pull_cursor: row.get("pull_cursor"),
            last_push_at: parse_optional_datetime(row.get("last_push_at"))?,
        })
    }

    async fn record_pull(&self, pulled_at: DateTime<Utc>, cursor: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_state (id, last_pull_at, pull_cursor) VALUES (1, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                last_pull_at = excluded.last_pull_at, \
                pull_cursor = COALESCE(excluded.pull_cursor, sync_state.pull_cursor)",
        )
        .bind(format_timestamp(pulled_at))
        .bind(cursor)
        .execute(&self.pool)
        .await
        .context("Failed to advance pull watermark")?;

        Ok(())
    }

    async fn record_push(&self, pushed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_state (id, last_push_at) VALUES (1, ?) \
             ON CONFLICT(id) DO UPDATE SET last_push_at = excluded.last_push_at",
        )
        .bind(format_timestamp(pushed_at))
        .execute(&self.pool)
        .await
        .context("Failed to advance push watermark")?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Sync log
    // ------------------------------------------------------------------

    async fn insert_log(&self, entry: &SyncLogEntry) -> Result<LogEntryId> {
        let result = sqlx::query(
            "INSERT INTO sync_log \
                (sync_type, table_name, operation, status, error_message, started_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.sync_type().as_str())
        .bind(entry.table_name())
        .bind(entry.operation())
        .bind(entry.status().as_str())
        .bind(entry.error_message())
        .bind(format_timestamp(entry.started_at()))
        .execute(&self.pool)
        .await
        .context("Failed to insert sync log entry")?;

        Ok(LogEntryId::new(result.last_insert_rowid()))
    }

    async fn finish_log(
        &self,
        id: LogEntryId,
        status: SyncStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        if !status.is_terminal() {
            anyhow::bail!("Cannot finish log entry {} with status {}", id, status);
        }

        let result = sqlx::query(
            "UPDATE sync_log SET status = ?, error_message = ? \
             WHERE id = ? AND status = 'in_progress'",
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(id.value())
        .execute(&self.pool)
        .await
        .context("Failed to finish sync log entry")?;

        Ok(result.rows_affected() > 0)
    }

    async fn recent_log(&self, limit: u32) -> Result<Vec<SyncLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, sync_type, table_name, operation, status, error_message, started_at \
             FROM sync_log ORDER BY started_at DESC, id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to query sync log")?;

        rows.iter()
            .map(|row| log_entry_from_row(row).map_err(Into::into))
            .collect()
    }

    async fn delete_log_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sync_log WHERE started_at < ?")
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await
            .context("Failed to prune sync log")?;

        Ok(result.rows_affected())
    }

    async fn last_completed_sync(&self) -> Result<Option<DateTime<Utc>>> {
        let started_at: Option<String> = sqlx::query_scalar(
            "SELECT started_at FROM sync_log \
             WHERE table_name IS NULL AND status = 'success' \
             ORDER BY started_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query last completed sync")?;

        Ok(parse_optional_datetime(started_at)?)
    }

    // ------------------------------------------------------------------
    // Conflicts
    // ------------------------------------------------------------------

    async fn insert_conflict(&self, conflict: &SyncConflict) -> Result<ConflictId> {
        let local_data = conflict
            .local_data()
            .to_json_string()
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        let remote_data = conflict
            .remote_data()
            .to_json_string()
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO sync_conflicts \
                (table_name, record_id, local_data, remote_data, resolved, created_at) \
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(conflict.table_name())
        .bind(conflict.record_id())
        .bind(local_data)
        .bind(remote_data)
        .bind(format_timestamp(conflict.created_at()))
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Failed to record conflict for {}#{}",
                conflict.table_name(),
                conflict.record_id()
            )
        })?;

        Ok(ConflictId::new(result.last_insert_rowid()))
    }

    async fn get_conflict(&self, id: ConflictId) -> Result<Option<SyncConflict>> {
        let row = sqlx::query("SELECT * FROM sync_conflicts WHERE id = ?")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load conflict")?;

        match row {
            Some(row) => Ok(Some(conflict_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_conflicts(&self, include_resolved: bool) -> Result<Vec<SyncConflict>> {
        let sql = if include_resolved {
            "SELECT * FROM sync_conflicts ORDER BY created_at DESC, id DESC"
        } else {
            "SELECT * FROM sync_conflicts WHERE resolved = 0 ORDER BY created_at DESC, id DESC"
        };
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list conflicts")?;

        rows.iter()
            .map(|row| conflict_from_row(row).map_err(Into::into))
            .collect()
    }

    async fn has_unresolved_conflict(&self, table: &TableName, record_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sync_conflicts \
             WHERE table_name = ? AND record_id = ? AND resolved = 0",
        )
        .bind(table.as_str())
        .bind(record_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check for open conflicts")?;

        Ok(count > 0)
    }

    async fn count_unresolved_conflicts(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sync_conflicts WHERE resolved = 0")
                .fetch_one(&self.pool)
                .await
                .context("Failed to count conflicts")?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn apply_resolution(
        &self,
        conflict: &SyncConflict,
        resolution: Resolution,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool> {
        let id = conflict
            .id()
            .context("Cannot resolve a conflict that was never stored")?;
        let table = TableName::new(conflict.table_name())?;
        let ts = format_timestamp(resolved_at);

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let closed = sqlx::query(
            "UPDATE sync_conflicts SET resolved = 1, resolution = ?, resolved_at = ? \
             WHERE id = ? AND resolved = 0",
        )
        .bind(resolution.as_str())
        .bind(&ts)
        .bind(id.value())
        .execute(&mut *tx)
        .await
        .context("Failed to mark conflict resolved")?;

        if closed.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Ok(false);
        }

        let shape = table_shape(&mut *tx, &table).await?;
        let snapshot = conflict.snapshot(resolution);
        let columns = shape.writable_columns(snapshot);

        // Local wins: the row stays dirty so it is pushed. Remote wins: clean.
        let synced_at = match resolution {
            Resolution::Local => None,
            Resolution::Remote => Some(ts.clone()),
        };

        let mut assignments: Vec<String> = columns
            .iter()
            .map(|c| format!("{} = ?", quote_ident(c)))
            .collect();
        assignments.push(format!("{} = ?", quote_ident(UPDATED_AT_COLUMN)));
        if synced_at.is_some() {
            assignments.push(format!("{} = ?", quote_ident(SYNCED_AT_COLUMN)));
        }

        let update_sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_ident(table.as_str()),
            assignments.join(", "),
            quote_ident(PRIMARY_KEY_COLUMN)
        );
        let mut update = sqlx::query(&update_sql);
        for column in &columns {
            update = bind_json(update, snapshot.get(column).unwrap_or(&Value::Null));
        }
        update = update.bind(ts.clone());
        if let Some(ref synced) = synced_at {
            update = update.bind(synced.clone());
        }
        let updated = update
            .bind(conflict.record_id())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to update {}#{}", table, conflict.record_id()))?;

        if updated.rows_affected() == 0 {
            debug!(
                table = %table,
                record_id = conflict.record_id(),
                "Row vanished since the conflict was recorded, re-inserting"
            );
            let mut insert_cols: Vec<String> = vec![quote_ident(PRIMARY_KEY_COLUMN)];
            insert_cols.extend(columns.iter().map(|c| quote_ident(c)));
            insert_cols.push(quote_ident(UPDATED_AT_COLUMN));
            insert_cols.push(quote_ident(SYNCED_AT_COLUMN));
            let insert_sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table.as_str()),
                insert_cols.join(", "),
                vec!["?"; insert_cols.len()].join(", ")
            );
            let mut insert = sqlx::query(&insert_sql).bind(conflict.record_id());
            for column in &columns {
                insert = bind_json(insert, snapshot.get(column).unwrap_or(&Value::Null));
            }
            insert
                .bind(ts.clone())
                .bind(synced_at)
                .execute(&mut *tx)
                .await
                .with_context(|| {
                    format!("Failed to re-insert {}#{}", table, conflict.record_id())
                })?;
        }

        tx.commit().await.context("Failed to commit resolution")?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Business rows
    // ------------------------------------------------------------------

    async fn table_exists(&self, table: &TableName) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to inspect schema")?;

        Ok(count > 0)
    }

    async fn get_record(&self, table: &TableName, record_id: i64) -> Result<Option<LocalRecord>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            quote_ident(table.as_str()),
            quote_ident(PRIMARY_KEY_COLUMN)
        );
        let row = sqlx::query(&sql)
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read {}#{}", table, record_id))?;

        match row {
            Some(row) => Ok(Some(local_record_from_row(table, &row)?)),
            None => Ok(None),
        }
    }

    async fn apply_remote(
        &self,
        table: &TableName,
        record_id: i64,
        data: &Record,
        expected: Option<&LocalRecord>,
        applied_at: DateTime<Utc>,
    ) -> Result<bool> {
        let ts = format_timestamp(applied_at);
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let shape = table_shape(&mut *tx, table).await?;
        let columns = shape.writable_columns(data);
        if columns.len() + 1 < data.without_tracking().len() {
            debug!(
                table = %table,
                record_id,
                "Dropping remote columns unknown to the local schema"
            );
        }

        let mut insert_cols: Vec<String> = vec![quote_ident(PRIMARY_KEY_COLUMN)];
        insert_cols.extend(columns.iter().map(|c| quote_ident(c)));
        insert_cols.push(quote_ident(UPDATED_AT_COLUMN));
        insert_cols.push(quote_ident(SYNCED_AT_COLUMN));

        // Absent when read: insert only. Present: update only while the
        // tracking pair still matches what was read.
        let on_conflict = match expected {
            None => "DO NOTHING".to_string(),
            Some(_) => {
                let updates: Vec<String> = insert_cols
                    .iter()
                    .skip(1)
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect();
                format!(
                    "DO UPDATE SET {} WHERE {} IS ? AND {} IS ?",
                    updates.join(", "),
                    quote_ident(UPDATED_AT_COLUMN),
                    quote_ident(SYNCED_AT_COLUMN)
                )
            }
        };

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
            quote_ident(table.as_str()),
            insert_cols.join(", "),
            vec!["?"; insert_cols.len()].join(", "),
            quote_ident(PRIMARY_KEY_COLUMN),
            on_conflict
        );

        let mut query = sqlx::query(&sql).bind(record_id);
        for column in &columns {
            query = bind_json(query, data.get(column).unwrap_or(&Value::Null));
        }
        query = query.bind(ts.clone()).bind(ts);
        if let Some(seen) = expected {
            query = query
                .bind(seen.updated_at.as_deref())
                .bind(seen.synced_at.as_deref());
        }

        let result = query
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to apply remote change to {}#{}", table, record_id))?;

        tx.commit().await.context("Failed to commit remote change")?;

        let applied = result.rows_affected() > 0;
        if !applied {
            debug!(table = %table, record_id, "Row changed since it was read, not applied");
        }
        Ok(applied)
    }

    async fn dirty_records(&self, table: &TableName) -> Result<Vec<LocalRecord>> {
        if !self.table_exists(table).await? {
            debug!(table = %table, "Synchronized table not present locally, skipping");
            return Ok(Vec::new());
        }
        table_shape(&self.pool, table).await?;

        let sql = format!(
            "SELECT * FROM {t} WHERE {s} IS NULL OR {s} <> {u} ORDER BY {pk}",
            t = quote_ident(table.as_str()),
            s = quote_ident(SYNCED_AT_COLUMN),
            u = quote_ident(UPDATED_AT_COLUMN),
            pk = quote_ident(PRIMARY_KEY_COLUMN)
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to collect dirty rows from {}", table))?;

        rows.iter()
            .map(|row| local_record_from_row(table, row).map_err(Into::into))
            .collect()
    }

    async fn count_dirty(&self, table: &TableName) -> Result<u64> {
        if !self.table_exists(table).await? {
            return Ok(0);
        }
        table_shape(&self.pool, table).await?;

        let sql = format!(
            "SELECT COUNT(*) FROM {t} WHERE {s} IS NULL OR {s} <> {u}",
            t = quote_ident(table.as_str()),
            s = quote_ident(SYNCED_AT_COLUMN),
            u = quote_ident(UPDATED_AT_COLUMN)
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count dirty rows in {}", table))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn mark_synced(&self, records: &[LocalRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let mut marked = 0;

        for record in records {
            // IS compares NULLs as equal; a row edited after it was read keeps
            // a different updated_at and is left dirty.
            let sql = format!(
                "UPDATE {t} SET {s} = {u} WHERE {pk} = ? AND {u} IS ?",
                t = quote_ident(record.table_name.as_str()),
                s = quote_ident(SYNCED_AT_COLUMN),
                u = quote_ident(UPDATED_AT_COLUMN),
                pk = quote_ident(PRIMARY_KEY_COLUMN)
            );
            let result = sqlx::query(&sql)
                .bind(record.record_id)
                .bind(record.updated_at.as_deref())
                .execute(&mut *tx)
                .await
                .with_context(|| {
                    format!(
                        "Failed to mark {}#{} synced",
                        record.table_name, record.record_id
                    )
                })?;
            marked += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit push bookkeeping")?;
        Ok(marked)
    }
}
