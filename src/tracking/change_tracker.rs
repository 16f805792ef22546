use uuid::Uuid;

use crate::database::record::Record;
use crate::tracking::mutation::{PendingMutation, TrackingError};
use crate::types::ChangeKind;

/// Queue of pending mutations for one unit of work.
///
/// At most one entry exists per (schema, id). Tracking the same entity again
/// folds the new request into the existing entry:
/// - Create then Update stays a Create carrying the newer record
/// - Create then Delete drops the entry (nothing was ever stored)
/// - Update then Delete becomes a Delete
/// - Delete then Update becomes an Update (the later request wins)
#[derive(Debug, Default)]
pub struct ChangeTracker {
    entries: Vec<PendingMutation>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new entity. A v4 id is assigned when the record has none.
    pub fn add(&mut self, schema: &str, mut record: Record) -> Result<Uuid, TrackingError> {
        let id = match record.id() {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                record.set_id(id);
                id
            }
        };
        self.track(schema, id, record, ChangeKind::Create);
        Ok(id)
    }

    pub fn update(&mut self, schema: &str, record: Record) -> Result<Uuid, TrackingError> {
        let id = Self::require_id(schema, &record, ChangeKind::Update)?;
        self.track(schema, id, record, ChangeKind::Update);
        Ok(id)
    }

    pub fn remove(&mut self, schema: &str, record: Record) -> Result<Uuid, TrackingError> {
        let id = Self::require_id(schema, &record, ChangeKind::Delete)?;
        self.track(schema, id, record, ChangeKind::Delete);
        Ok(id)
    }

    pub fn entries(&self) -> &[PendingMutation] {
        &self.entries
    }

    pub fn has_changes(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every pending mutation (accept all changes)
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn require_id(schema: &str, record: &Record, operation: ChangeKind) -> Result<Uuid, TrackingError> {
        record.id().ok_or_else(|| TrackingError::MissingId {
            schema: schema.to_string(),
            operation,
        })
    }

    fn track(&mut self, schema: &str, id: Uuid, record: Record, kind: ChangeKind) {
        let existing = self
            .entries
            .iter()
            .position(|m| m.schema == schema && m.id() == Some(id));

        let Some(index) = existing else {
            tracing::trace!("Tracking {:?} for {} {}", kind, schema, id);
            self.entries.push(PendingMutation::new(schema, record, kind));
            return;
        };

        let merged = match (self.entries[index].kind(), kind) {
            (ChangeKind::Create, ChangeKind::Delete) => None,
            (ChangeKind::Create, _) => Some(ChangeKind::Create),
            (_, kind) => Some(kind),
        };

        match merged {
            Some(kind) => {
                tracing::trace!("Re-tracking {} {} as {:?}", schema, id, kind);
                self.entries[index] = PendingMutation::new(schema, record, kind);
            }
            None => {
                tracing::trace!("Dropping never-stored {} {}", schema, id);
                self.entries.remove(index);
            }
        }
    }
}
