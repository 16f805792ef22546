use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::record::Record;

/// Set once when the entity is created. Never null, never rewritten.
pub const INSERT_DATE: &str = "insert_date";
/// Refreshed on every modification.
pub const UPDATE_DATE: &str = "update_date";
/// Set once when the entity is logically removed.
pub const REMOVE_DATE: &str = "remove_date";
/// Soft-delete flag.
pub const IS_REMOVED: &str = "is_removed";

/// The four fields every auditable entity carries, in storage order
pub const AUDIT_FIELDS: [&str; 4] = [INSERT_DATE, UPDATE_DATE, REMOVE_DATE, IS_REMOVED];

/// Audit fields holding timestamps (bound as TIMESTAMPTZ by the Postgres store)
pub const AUDIT_TIMESTAMP_FIELDS: [&str; 3] = [INSERT_DATE, UPDATE_DATE, REMOVE_DATE];

pub fn is_audit_field(field: &str) -> bool {
    AUDIT_FIELDS.contains(&field)
}

/// Encode a timestamp the way records store it
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Removal status of a single auditable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalState {
    Active,
    Removed { at: DateTime<Utc> },
}

impl RemovalState {
    pub fn is_removed(&self) -> bool {
        matches!(self, RemovalState::Removed { .. })
    }
}

/// Typed, read-only view over the audit fields of a record.
///
/// Business code reads audit state through this struct; only the audit
/// interceptor writes the underlying fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    pub insert_date: Option<DateTime<Utc>>,
    pub update_date: Option<DateTime<Utc>>,
    pub remove_date: Option<DateTime<Utc>>,
    pub is_removed: bool,
}

impl AuditFields {
    /// Read audit fields from a record. Returns `None` when the record
    /// carries none of them (non-auditable entity).
    pub fn from_record(record: &Record) -> Option<Self> {
        if !AUDIT_FIELDS.iter().any(|field| record.get(field).is_some()) {
            return None;
        }

        Some(Self {
            insert_date: record.get(INSERT_DATE).and_then(parse_timestamp),
            update_date: record.get(UPDATE_DATE).and_then(parse_timestamp),
            remove_date: record.get(REMOVE_DATE).and_then(parse_timestamp),
            is_removed: record
                .get(IS_REMOVED)
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        })
    }

    pub fn removal_state(&self) -> RemovalState {
        match (self.is_removed, self.remove_date) {
            (true, Some(at)) => RemovalState::Removed { at },
            _ => RemovalState::Active,
        }
    }
}
