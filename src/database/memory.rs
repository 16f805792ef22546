// In-process storage engine implementing both store traits
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::record::Record;
use crate::database::store::{AsyncStore, Store, WriteCommand};
use crate::model::audit_fields::IS_REMOVED;

type Row = HashMap<String, Value>;
type Tables = HashMap<String, BTreeMap<Uuid, Row>>;

/// Tables of `id -> row`. Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    batches: Arc<RwLock<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a stored row as a tracked record
    pub fn get(&self, table: &str, id: Uuid) -> Option<Record> {
        self.read()
            .get(table)
            .and_then(|rows| rows.get(&id))
            .map(|row| Record::from_sql_data(row.clone()))
    }

    /// All rows of a table in id order. Soft-deleted rows are included only
    /// when `include_removed` is set.
    pub fn list(&self, table: &str, include_removed: bool) -> Vec<Record> {
        self.read()
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|row| include_removed || !is_removed(row))
                    .map(|row| Record::from_sql_data(row.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Row count including soft-deleted rows
    pub fn count(&self, table: &str) -> usize {
        self.read().get(table).map(BTreeMap::len).unwrap_or(0)
    }

    /// Number of batches applied successfully
    pub fn batches_executed(&self) -> u64 {
        *self.batches.read().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    fn apply(&self, batch: &[WriteCommand]) -> Result<u64, DatabaseError> {
        let mut tables = self.write();

        validate(&tables, batch)?;

        for command in batch {
            match command {
                WriteCommand::Insert { table, id, values } => {
                    let mut row: Row = values.clone().into_iter().collect();
                    row.insert("id".to_string(), Value::String(id.to_string()));
                    tables.entry(table.clone()).or_default().insert(*id, row);
                }
                WriteCommand::Update { table, id, values, set_once } => {
                    if let Some(row) = tables.get_mut(table).and_then(|rows| rows.get_mut(id)) {
                        for (field, value) in values {
                            let stored = row.get(field).filter(|v| !v.is_null());
                            if set_once.contains(field) && stored.is_some() {
                                continue;
                            }
                            row.insert(field.clone(), value.clone());
                        }
                    }
                }
                WriteCommand::Delete { table, id } => {
                    if let Some(rows) = tables.get_mut(table) {
                        rows.remove(id);
                    }
                }
            }
        }

        *self.batches.write().unwrap_or_else(|e| e.into_inner()) += 1;

        tracing::debug!("MemoryStore applied {} commands", batch.len());
        Ok(batch.len() as u64)
    }
}

fn is_removed(row: &Row) -> bool {
    row.get(IS_REMOVED).and_then(Value::as_bool).unwrap_or(false)
}

/// Check the whole batch against current state (and earlier commands of the
/// same batch) before anything is written
fn validate(tables: &Tables, batch: &[WriteCommand]) -> Result<(), DatabaseError> {
    let mut inserted: Vec<(&str, Uuid)> = Vec::new();
    let mut deleted: Vec<(&str, Uuid)> = Vec::new();

    for command in batch {
        let key = (command.table(), command.id());
        let stored = tables
            .get(key.0)
            .map(|rows| rows.contains_key(&key.1))
            .unwrap_or(false);
        let exists = (stored || inserted.contains(&key)) && !deleted.contains(&key);

        match command {
            WriteCommand::Insert { .. } => {
                if exists {
                    return Err(DatabaseError::Conflict(format!(
                        "{} {} already exists",
                        key.0, key.1
                    )));
                }
                deleted.retain(|k| k != &key);
                inserted.push(key);
            }
            WriteCommand::Update { .. } | WriteCommand::Delete { .. } => {
                if !exists {
                    return Err(DatabaseError::NotFound(format!("{} {}", key.0, key.1)));
                }
                if command.is_delete() {
                    inserted.retain(|k| k != &key);
                    deleted.push(key);
                }
            }
        }
    }

    Ok(())
}

impl Store for MemoryStore {
    fn execute(&mut self, batch: &[WriteCommand]) -> Result<u64, DatabaseError> {
        self.apply(batch)
    }
}

#[async_trait]
impl AsyncStore for MemoryStore {
    async fn execute(
        &self,
        batch: &[WriteCommand],
        cancel: CancellationToken,
    ) -> Result<u64, DatabaseError> {
        if cancel.is_cancelled() {
            return Err(DatabaseError::Cancelled);
        }
        self.apply(batch)
    }
}
