use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::database::record::Record;
use crate::database::store::WriteCommand;
use crate::model::audit_fields::{INSERT_DATE, IS_REMOVED, REMOVE_DATE};
use crate::model::Model;
use crate::types::{ChangeKind, WriteAction};

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("{operation:?} on '{schema}' requires a record id")]
    MissingId { schema: String, operation: ChangeKind },

    #[error("Entity did not serialize to a JSON object: {0}")]
    NotAnObject(String),

    #[error("Entity serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One entity instance queued for the next commit
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub schema: String,
    pub record: Record,
    kind: ChangeKind,
    action: WriteAction,
}

impl PendingMutation {
    pub fn new(schema: impl Into<String>, record: Record, kind: ChangeKind) -> Self {
        Self {
            schema: schema.into(),
            record,
            kind,
            action: WriteAction::from(kind),
        }
    }

    /// Change kind requested by application code
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Write the store will perform for this mutation
    pub fn action(&self) -> WriteAction {
        self.action
    }

    /// Redirect a delete into an update (soft delete)
    pub fn convert_to_update(&mut self) {
        self.action = WriteAction::Update;
    }

    pub fn is_soft_delete(&self) -> bool {
        self.kind == ChangeKind::Delete && self.action == WriteAction::Update
    }

    pub fn id(&self) -> Option<Uuid> {
        self.record.id()
    }

    /// Compile into the physical write handed to the store
    pub fn to_write_command(&self, model: &Model) -> Result<WriteCommand, TrackingError> {
        let id = self.id().ok_or_else(|| TrackingError::MissingId {
            schema: self.schema.clone(),
            operation: self.kind,
        })?;
        let table = self.schema.clone();

        let command = match self.action {
            WriteAction::Insert => {
                let mut values = self.record.to_map();
                values.remove("id");
                WriteCommand::Insert { table, id, values }
            }
            WriteAction::Update if self.is_soft_delete() => {
                // A soft delete only flips the removal fields
                let mut values = Map::new();
                for field in [IS_REMOVED, REMOVE_DATE] {
                    values.insert(
                        field.to_string(),
                        self.record.get(field).cloned().unwrap_or(Value::Null),
                    );
                }
                // remove_date is decided by the stored row, not the tracked copy
                let set_once = vec![REMOVE_DATE.to_string()];
                WriteCommand::Update { table, id, values, set_once }
            }
            WriteAction::Update => {
                let mut values = self.record.write_values();
                if model.is_auditable(&self.schema) {
                    values.remove(INSERT_DATE);
                }
                WriteCommand::Update { table, id, values, set_once: Vec::new() }
            }
            WriteAction::Delete => WriteCommand::Delete { table, id },
        };

        Ok(command)
    }
}
