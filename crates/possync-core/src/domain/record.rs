//! Generic business record
//!
//! The sync engine never models sales, products or clients as typed
//! entities. A business row travels as a [`Record`]: an ordered bag of
//! column name to JSON value. Conflict snapshots use the same shape so the
//! resolver can write any table back without knowing its schema.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primary-key column shared by every synchronized table
pub const PRIMARY_KEY_COLUMN: &str = "id";

/// Per-row last-modified timestamp, written by the application on every edit
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Copy of `updated_at` taken at the last confirmed push or remote apply
pub const SYNCED_AT_COLUMN: &str = "synced_at";

/// Change-tracking columns; never part of a snapshot or a payload comparison
pub const TRACKING_COLUMNS: &[&str] = &[UPDATED_AT_COLUMN, SYNCED_AT_COLUMN];

/// Formats a timestamp the way the engine writes tracking columns
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a tracking-column timestamp
///
/// Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS` form SQLite's
/// `datetime('now')` produces, read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

/// Column to value map for one business row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored for `column`
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Sets `column` to `value`, returning the previous value
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(column.into(), value.into())
    }

    /// Removes `column` from the record
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    /// Builder-style variant of [`Record::insert`]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(column, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Column names in order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns a copy without the change-tracking columns
    pub fn without_tracking(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| !TRACKING_COLUMNS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Returns true if applying `incoming` would change this record
    ///
    /// Only the columns present in `incoming` are compared; the primary key
    /// and tracking columns are ignored. Numbers compare by value, so a
    /// local `INTEGER 5` equals a remote `5.0`.
    pub fn differs_from(&self, incoming: &Record) -> bool {
        incoming
            .iter()
            .filter(|(k, _)| {
                k.as_str() != PRIMARY_KEY_COLUMN && !TRACKING_COLUMNS.contains(&k.as_str())
            })
            .any(|(k, remote)| match self.get(k) {
                Some(local) => !values_equal(local, remote),
                None => !remote.is_null(),
            })
    }

    /// Serializes the record to a JSON object string
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }

    /// Parses a record from a JSON object string
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s).map(Self)
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        // SQLite has no boolean type; the remote may send true where we store 1
        (Value::Bool(x), Value::Number(n)) | (Value::Number(n), Value::Bool(x)) => {
            n.as_i64() == Some(i64::from(*x))
        }
        _ => a == b,
    }
}
