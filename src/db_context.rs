use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::config;
use crate::database::manager::DatabaseError;
use crate::database::record::Record;
use crate::database::store::{AsyncStore, Store, WriteCommand};
use crate::error::SaveError;
use crate::interceptor::{AuditInterceptor, AuditSummary, Clock, Interceptor, InterceptorPipeline, SaveContext};
use crate::model::{Entity, Model};
use crate::tracking::{ChangeTracker, TrackingError};

/// Writes compiled from one interceptor pass
struct PreparedBatch {
    commands: Vec<WriteCommand>,
    audit: Option<AuditSummary>,
    started: Instant,
}

/// Unit of work over a store.
///
/// Entities are tracked with `add` / `update` / `remove` and written by one of
/// the `save_changes*` calls. Every commit runs the interceptor pipeline, which
/// always contains the audit interceptor.
pub struct DbContext<S> {
    model: Arc<Model>,
    pipeline: InterceptorPipeline,
    tracker: ChangeTracker,
    store: S,
    last_audit: Option<AuditSummary>,
}

impl<S> DbContext<S> {
    pub fn new(model: Arc<Model>, store: S) -> Self {
        Self::with_audit(model, store, AuditInterceptor::new())
    }

    /// Use `clock` for audit timestamps
    pub fn with_clock(model: Arc<Model>, store: S, clock: Arc<dyn Clock>) -> Self {
        Self::with_audit(model, store, AuditInterceptor::with_clock(clock))
    }

    fn with_audit(model: Arc<Model>, store: S, audit: AuditInterceptor) -> Self {
        let mut pipeline = InterceptorPipeline::new();
        pipeline.register(Box::new(audit));
        Self {
            model,
            pipeline,
            tracker: ChangeTracker::new(),
            store,
            last_audit: None,
        }
    }

    pub fn register_interceptor(&mut self, interceptor: Box<dyn Interceptor>) {
        self.pipeline.register(interceptor);
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn has_changes(&self) -> bool {
        self.tracker.has_changes()
    }

    /// Drop every pending mutation without writing
    pub fn discard_changes(&mut self) {
        self.tracker.clear();
    }

    /// Mark pending mutations as persisted after a commit made with
    /// `accept_all_changes_on_success = false`
    pub fn accept_all_changes(&mut self) {
        tracing::debug!("Accepting {} pending mutations", self.tracker.len());
        self.tracker.clear();
    }

    /// Audit summary of the last successful commit
    pub fn last_audit_summary(&self) -> Option<&AuditSummary> {
        self.last_audit.as_ref()
    }

    // ========================================
    // Tracking
    // ========================================

    pub fn add<T: Entity>(&mut self, entity: &T) -> Result<Uuid, TrackingError> {
        let record = entity_record(entity, self.model.is_auditable(T::NAME))?;
        self.tracker.add(T::NAME, record)
    }

    pub fn update<T: Entity>(&mut self, entity: &T) -> Result<Uuid, TrackingError> {
        let record = entity_record(entity, self.model.is_auditable(T::NAME))?;
        self.tracker.update(T::NAME, record)
    }

    pub fn remove<T: Entity>(&mut self, entity: &T) -> Result<Uuid, TrackingError> {
        let record = entity_record(entity, self.model.is_auditable(T::NAME))?;
        self.tracker.remove(T::NAME, record)
    }

    pub fn add_record(&mut self, schema: &str, record: Record) -> Result<Uuid, TrackingError> {
        self.tracker.add(schema, record)
    }

    pub fn update_record(&mut self, schema: &str, record: Record) -> Result<Uuid, TrackingError> {
        self.tracker.update(schema, record)
    }

    pub fn remove_record(&mut self, schema: &str, record: Record) -> Result<Uuid, TrackingError> {
        self.tracker.remove(schema, record)
    }

    // ========================================
    // Commit
    // ========================================

    /// Run the interceptor pipeline over a snapshot of the pending mutations
    /// and compile the result. Shared by the sync and async commit paths.
    /// Returns `None` when nothing is pending.
    fn prepare_batch(&self) -> Result<Option<PreparedBatch>, SaveError> {
        if !self.tracker.has_changes() {
            tracing::debug!("Nothing to commit");
            return Ok(None);
        }

        let mut ctx = SaveContext::new(self.model.clone(), self.tracker.entries().to_vec());
        self.pipeline.run(&mut ctx)?;

        let commands = ctx
            .mutations
            .iter()
            .map(|mutation| mutation.to_write_command(&self.model))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(PreparedBatch {
            commands,
            audit: ctx.take_metadata::<AuditSummary>(),
            started: ctx.start_time,
        }))
    }

    fn finish(&mut self, batch: PreparedBatch, affected: u64, accept_all_changes_on_success: bool) {
        tracing::info!(
            "Committed {} mutations ({} rows) in {:?}",
            batch.commands.len(),
            affected,
            batch.started.elapsed()
        );
        self.last_audit = batch.audit;
        if accept_all_changes_on_success {
            self.tracker.clear();
        }
    }
}

impl<S: Store> DbContext<S> {
    pub fn save_changes(&mut self) -> Result<u64, SaveError> {
        self.save_changes_with(config().context.accept_all_changes_on_success)
    }

    pub fn save_changes_with(&mut self, accept_all_changes_on_success: bool) -> Result<u64, SaveError> {
        let Some(batch) = self.prepare_batch()? else {
            return Ok(0);
        };

        let affected = Store::execute(&mut self.store, &batch.commands).map_err(store_failure)?;
        self.finish(batch, affected, accept_all_changes_on_success);
        Ok(affected)
    }
}

impl<S: AsyncStore> DbContext<S> {
    pub async fn save_changes_async(&mut self, cancel: CancellationToken) -> Result<u64, SaveError> {
        self.save_changes_async_with(config().context.accept_all_changes_on_success, cancel)
            .await
    }

    pub async fn save_changes_async_with(
        &mut self,
        accept_all_changes_on_success: bool,
        cancel: CancellationToken,
    ) -> Result<u64, SaveError> {
        // Interception completes before the first await
        let Some(batch) = self.prepare_batch()? else {
            return Ok(0);
        };

        if cancel.is_cancelled() {
            tracing::debug!("Commit cancelled before reaching the store");
            return Err(SaveError::Cancelled);
        }

        let affected = AsyncStore::execute(&self.store, &batch.commands, cancel)
            .await
            .map_err(store_failure)?;
        self.finish(batch, affected, accept_all_changes_on_success);
        Ok(affected)
    }
}

fn store_failure(error: DatabaseError) -> SaveError {
    match error {
        DatabaseError::Cancelled => {
            tracing::debug!("Commit cancelled by the store");
            SaveError::Cancelled
        }
        error => {
            tracing::error!("Commit failed: {}", error);
            SaveError::Store(error)
        }
    }
}

fn entity_record<T: Entity>(entity: &T, auditable: bool) -> Result<Record, TrackingError> {
    match serde_json::to_value(entity)? {
        serde_json::Value::Object(map) => {
            let mut record = Record::from_entity_map(map, auditable);
            record.set_id(entity.id());
            Ok(record)
        }
        other => Err(TrackingError::NotAnObject(format!("{} serialized to {}", T::NAME, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::model::audit_fields::INSERT_DATE;
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Serialize};

    struct Fixed;

    impl Clock for Fixed {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Ticket {
        id: Uuid,
        title: String,
    }

    impl Entity for Ticket {
        const NAME: &'static str = "tickets";
        const AUDITABLE: bool = true;

        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn context() -> DbContext<MemoryStore> {
        let model = Model::builder().entity::<Ticket>().build_shared();
        DbContext::with_clock(model, MemoryStore::new(), Arc::new(Fixed))
    }

    #[test]
    fn empty_commit_skips_the_store() {
        let mut ctx = context();
        assert_eq!(ctx.save_changes().unwrap(), 0);
        assert_eq!(ctx.store().batches_executed(), 0);
    }

    #[test]
    fn typed_entities_are_tracked_under_their_name() {
        let mut ctx = context();
        let ticket = Ticket { id: Uuid::new_v4(), title: "Broken".into() };

        assert_eq!(ctx.add(&ticket).unwrap(), ticket.id);
        assert_eq!(ctx.tracker().entries()[0].schema, "tickets");

        ctx.save_changes_with(true).unwrap();
        let stored = ctx.store().get("tickets", ticket.id).unwrap();
        assert_eq!(stored.insert_date(), Some(Fixed.now()));
        assert!(stored.get(INSERT_DATE).is_some());
        assert!(!ctx.has_changes());
    }

    #[test]
    fn prepare_batch_is_repeatable_with_a_fixed_clock() {
        let ctx = {
            let mut ctx = context();
            ctx.add(&Ticket { id: Uuid::nil(), title: "Same".into() }).unwrap();
            ctx
        };

        let first = ctx.prepare_batch().unwrap().unwrap();
        let second = ctx.prepare_batch().unwrap().unwrap();
        assert_eq!(first.commands, second.commands);
        assert_eq!(first.audit, second.audit);
    }
}
