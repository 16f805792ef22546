use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::model::audit_fields::{
    self, parse_timestamp, INSERT_DATE, IS_REMOVED, REMOVE_DATE, UPDATE_DATE,
};

/// System fields that can only be set by interceptors, not by application input
pub const SYSTEM_FIELDS: &[&str] = &["id", INSERT_DATE, UPDATE_DATE, REMOVE_DATE, IS_REMOVED];

/// Field change information for diff tracking
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub change_type: ChangeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,    // Field didn't exist in original
    Modified, // Field existed but value changed
    Removed,  // Field was explicitly removed
}

/// Errors that can occur during Record operations
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("System field '{0}' cannot be set via application input")]
    SystemFieldNotAllowed(String),
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
}

/// A dynamic entity row with change tracking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// State as loaded from storage (None for detached / new records)
    original: Option<HashMap<String, Value>>,
    /// Current field values
    fields: HashMap<String, Value>,
    /// Fields that have been modified since original
    modified_fields: HashSet<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create record from application input JSON, rejecting system fields
    pub fn from_json(json: Value) -> Result<Self, RecordError> {
        match json {
            Value::Object(map) => {
                let mut record = Self::new();
                for (key, value) in map {
                    if SYSTEM_FIELDS.contains(&key.as_str()) {
                        return Err(RecordError::SystemFieldNotAllowed(key));
                    }
                    record.fields.insert(key, value);
                }
                Ok(record)
            }
            _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        }
    }

    /// Create a detached record from a serialized entity. The id is kept.
    /// For auditable types the audit fields are dropped since only the
    /// interceptor may write them; other types keep every field they declare.
    pub fn from_entity_map(map: Map<String, Value>, auditable: bool) -> Self {
        let mut record = Self::new();
        for (key, value) in map {
            if auditable && audit_fields::is_audit_field(&key) {
                tracing::warn!("Dropping audit field '{}' from entity input", key);
                continue;
            }
            record.fields.insert(key, value);
        }
        record
    }

    /// Create record from stored row data (allows system fields)
    pub fn from_sql_data(data: HashMap<String, Value>) -> Self {
        Self {
            original: Some(data.clone()),
            fields: data,
            modified_fields: HashSet::new(),
        }
    }

    /// Get field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set field value with automatic change tracking
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();

        // Interceptors use set_system_field
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            tracing::warn!("Attempted to set system field '{}' - ignoring", key);
            return self;
        }

        if self.original.is_some() {
            self.modified_fields.insert(key.clone());
        }

        self.fields.insert(key, value.into());
        self
    }

    /// Set system field (for interceptors only)
    pub fn set_system_field(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        let key = key.into();

        if self.original.is_some() {
            self.modified_fields.insert(key.clone());
        }

        self.fields.insert(key, value.into());
        self
    }

    /// Remove field and return its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if SYSTEM_FIELDS.contains(&key) {
            tracing::warn!("Attempted to remove system field '{}' - ignoring", key);
            return None;
        }
        if self.original.is_some() {
            self.modified_fields.insert(key.to_string());
        }
        self.fields.remove(key)
    }

    /// Apply multiple changes at once
    pub fn apply_changes(&mut self, changes: HashMap<String, Value>) -> &mut Self {
        for (key, value) in changes {
            self.set(key, value);
        }
        self
    }

    // ========================================
    // Standard field accessors
    // ========================================

    pub fn id(&self) -> Option<Uuid> {
        self.get("id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn set_id(&mut self, id: Uuid) -> &mut Self {
        self.set_system_field("id", Value::String(id.to_string()))
    }

    pub fn insert_date(&self) -> Option<DateTime<Utc>> {
        self.get(INSERT_DATE).and_then(parse_timestamp)
    }

    pub fn update_date(&self) -> Option<DateTime<Utc>> {
        self.get(UPDATE_DATE).and_then(parse_timestamp)
    }

    pub fn remove_date(&self) -> Option<DateTime<Utc>> {
        self.get(REMOVE_DATE).and_then(parse_timestamp)
    }

    /// Soft-delete flag; false when the record carries no audit fields
    pub fn is_removed(&self) -> bool {
        self.get(IS_REMOVED).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    // ========================================
    // Change tracking
    // ========================================

    /// Check if a specific field has been changed
    pub fn changed(&self, key: &str) -> bool {
        match (&self.original, self.fields.get(key)) {
            (Some(original), Some(current)) => original.get(key) != Some(current),
            (Some(original), None) => original.contains_key(key),
            (None, Some(_)) => true,
            (None, None) => false,
        }
    }

    /// Check if record has any changes
    pub fn has_changes(&self) -> bool {
        !self.modified_fields.is_empty() || self.original.is_none()
    }

    pub fn original(&self) -> Option<&HashMap<String, Value>> {
        self.original.as_ref()
    }

    pub fn get_original(&self, key: &str) -> Option<&Value> {
        self.original.as_ref()?.get(key)
    }

    /// Get detailed changes for each field
    pub fn changes(&self) -> HashMap<String, FieldChange> {
        let mut changes = HashMap::new();

        if let Some(original) = &self.original {
            for field in &self.modified_fields {
                let old_value = original.get(field).cloned();
                let new_value = self.fields.get(field).cloned();

                let change_type = match (&old_value, &new_value) {
                    (None, Some(_)) => ChangeType::Added,
                    (Some(_), None) => ChangeType::Removed,
                    (Some(old), Some(new)) if old != new => ChangeType::Modified,
                    _ => continue,
                };

                changes.insert(
                    field.clone(),
                    FieldChange { field: field.clone(), old_value, new_value, change_type },
                );
            }
        } else {
            for (field, value) in &self.fields {
                changes.insert(
                    field.clone(),
                    FieldChange {
                        field: field.clone(),
                        old_value: None,
                        new_value: Some(value.clone()),
                        change_type: ChangeType::Added,
                    },
                );
            }
        }

        changes
    }

    /// Values to write for this record, excluding `id`.
    ///
    /// Loaded records write only what changed (removed fields become NULL);
    /// detached records write every field they carry.
    pub fn write_values(&self) -> Map<String, Value> {
        let mut values = Map::new();

        match &self.original {
            Some(_) => {
                for (field, change) in self.changes() {
                    let value = match change.change_type {
                        ChangeType::Removed => Value::Null,
                        _ => change.new_value.unwrap_or(Value::Null),
                    };
                    values.insert(field, value);
                }
            }
            None => {
                for (field, value) in &self.fields {
                    values.insert(field.clone(), value.clone());
                }
            }
        }

        values.remove("id");
        values
    }

    // ========================================
    // Serialization
    // ========================================

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }

    pub fn to_hashmap(&self) -> HashMap<String, Value> {
        self.fields.clone()
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl From<HashMap<String, Value>> for Record {
    fn from(map: HashMap<String, Value>) -> Self {
        Self::from_sql_data(map)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_sql_data(map.into_iter().collect())
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.to_json()
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record(id: {:?}, fields: {}, changed: {})",
            self.id(),
            self.fields.len(),
            self.has_changes()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loaded(data: Value) -> Record {
        match data {
            Value::Object(map) => Record::from(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn from_json_rejects_audit_fields() {
        let err = Record::from_json(json!({ "price": 10, "insert_date": "2024-01-01T00:00:00Z" }))
            .unwrap_err();
        assert!(matches!(err, RecordError::SystemFieldNotAllowed(field) if field == "insert_date"));
    }

    #[test]
    fn set_ignores_system_fields() {
        let mut record = Record::from_json(json!({ "price": 10 })).unwrap();
        record.set("is_removed", true).set("update_date", "2024-01-01T00:00:00Z");

        assert!(record.get("is_removed").is_none());
        assert!(record.get("update_date").is_none());
    }

    #[test]
    fn entity_map_keeps_id_and_drops_audit_fields() {
        let id = Uuid::new_v4();
        let map = json!({ "id": id.to_string(), "price": 5, "remove_date": null })
            .as_object()
            .cloned()
            .unwrap();
        let record = Record::from_entity_map(map, true);

        assert_eq!(record.id(), Some(id));
        assert!(record.get("remove_date").is_none());
    }

    #[test]
    fn entity_map_of_plain_type_keeps_same_named_fields() {
        let map = json!({ "id": Uuid::new_v4().to_string(), "update_date": "2024-03-01" })
            .as_object()
            .cloned()
            .unwrap();
        let record = Record::from_entity_map(map, false);

        assert_eq!(record.get("update_date"), Some(&json!("2024-03-01")));
        assert_eq!(record.to_map().len(), 2);
    }

    #[test]
    fn loaded_record_writes_only_changes() {
        let mut record = loaded(json!({ "id": "a", "price": 10, "name": "order" }));
        record.set("price", 12);

        let values = record.write_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values.get("price"), Some(&json!(12)));
    }

    #[test]
    fn removed_field_is_written_as_null() {
        let mut record = loaded(json!({ "id": "a", "note": "x" }));
        record.remove("note");

        assert_eq!(record.write_values().get("note"), Some(&Value::Null));
    }

    #[test]
    fn detached_record_writes_all_fields_except_id() {
        let mut record = Record::from_json(json!({ "price": 10, "name": "order" })).unwrap();
        record.set_id(Uuid::new_v4());

        let values = record.write_values();
        assert_eq!(values.len(), 2);
        assert!(!values.contains_key("id"));
    }

    #[test]
    fn unchanged_set_is_not_a_change() {
        let mut record = loaded(json!({ "id": "a", "price": 10 }));
        record.set("price", 10);
        assert!(record.changes().is_empty());
    }
}
