use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::config;
use crate::interceptor::clock::{Clock, SystemClock};
use crate::interceptor::context::SaveContext;
use crate::interceptor::error::InterceptorError;
use crate::interceptor::traits::Interceptor;
use crate::model::audit_fields::{timestamp_value, INSERT_DATE, IS_REMOVED, REMOVE_DATE, UPDATE_DATE};
use crate::model::Model;
use crate::tracking::PendingMutation;
use crate::types::ChangeKind;

/// Outcome of one audit pass, stored in the save context metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub inserted: usize,
    pub updated: usize,
    pub soft_deleted: usize,
    /// Mutations on types that are not auditable
    pub skipped: usize,
}

impl AuditSummary {
    pub fn stamped(&self) -> usize {
        self.inserted + self.updated + self.soft_deleted
    }
}

/// Stamps audit fields on auditable entities and turns their deletes into
/// soft deletes. Runs last so earlier interceptors see the requested kinds.
pub struct AuditInterceptor {
    clock: Arc<dyn Clock>,
    debug_logging: bool,
}

impl AuditInterceptor {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            debug_logging: config().audit.debug_logging,
        }
    }

    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Apply one pass to `mutations` with a single timestamp `now`
    pub fn stamp(
        &self,
        model: &Model,
        mutations: &mut [PendingMutation],
        now: DateTime<Utc>,
    ) -> AuditSummary {
        let mut summary = AuditSummary::default();
        let stamp = timestamp_value(now);

        for mutation in mutations.iter_mut() {
            if !model.is_auditable(&mutation.schema) {
                summary.skipped += 1;
                continue;
            }

            match mutation.kind() {
                ChangeKind::Create => {
                    mutation
                        .record
                        .set_system_field(INSERT_DATE, stamp.clone())
                        .set_system_field(IS_REMOVED, false)
                        .set_system_field(UPDATE_DATE, Value::Null)
                        .set_system_field(REMOVE_DATE, Value::Null);
                    summary.inserted += 1;
                }
                ChangeKind::Update => {
                    mutation.record.set_system_field(UPDATE_DATE, stamp.clone());
                    summary.updated += 1;
                }
                ChangeKind::Delete => {
                    let already_removed =
                        mutation.record.is_removed() && mutation.record.remove_date().is_some();
                    if !already_removed {
                        mutation
                            .record
                            .set_system_field(IS_REMOVED, true)
                            .set_system_field(REMOVE_DATE, stamp.clone());
                    }
                    mutation.convert_to_update();
                    summary.soft_deleted += 1;
                }
            }

            if self.debug_logging {
                tracing::debug!(
                    "Audit: {:?} {} {:?} stamped at {}",
                    mutation.kind(),
                    mutation.schema,
                    mutation.id(),
                    now
                );
            }
        }

        summary
    }
}

impl Default for AuditInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for AuditInterceptor {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn priority(&self) -> u8 {
        90
    }

    fn before_save(&self, ctx: &mut SaveContext) -> Result<(), InterceptorError> {
        let now = self.clock.now();
        let summary = self.stamp(&ctx.model, &mut ctx.mutations, now);

        tracing::info!(
            "Audit pass: {} inserted, {} updated, {} soft-deleted, {} skipped",
            summary.inserted,
            summary.updated,
            summary.soft_deleted,
            summary.skipped
        );

        ctx.set_metadata(summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::record::Record;
    use crate::types::WriteAction;
    use chrono::TimeZone;
    use serde_json::json;
    use uuid::Uuid;

    struct Fixed(DateTime<Utc>);

    impl Clock for Fixed {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn model() -> Model {
        Model::builder()
            .entity_named("orders", true)
            .entity_named("tokens", false)
            .build()
    }

    fn stored(id: Uuid, extra: Value) -> Record {
        let mut data = json!({
            "id": id.to_string(),
            "price": 5,
            "insert_date": "2024-01-01T00:00:00+00:00",
            "is_removed": false,
            "update_date": null,
            "remove_date": null,
        });
        if let (Some(base), Some(extra)) = (data.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        Record::from(data.as_object().cloned().unwrap())
    }

    fn interceptor() -> AuditInterceptor {
        AuditInterceptor::with_clock(Arc::new(Fixed(at(12)))).debug_logging(false)
    }

    #[test]
    fn create_initialises_all_audit_fields() {
        let record = Record::from_json(json!({ "price": 1 })).unwrap();
        let mut mutations = vec![PendingMutation::new("orders", record, ChangeKind::Create)];

        let summary = interceptor().stamp(&model(), &mut mutations, at(12));

        let record = &mutations[0].record;
        assert_eq!(record.insert_date(), Some(at(12)));
        assert!(!record.is_removed());
        assert_eq!(record.get(UPDATE_DATE), Some(&Value::Null));
        assert_eq!(record.get(REMOVE_DATE), Some(&Value::Null));
        assert_eq!(summary.inserted, 1);
    }

    #[test]
    fn update_only_touches_update_date() {
        let id = Uuid::new_v4();
        let mut mutations = vec![PendingMutation::new("orders", stored(id, json!({})), ChangeKind::Update)];

        interceptor().stamp(&model(), &mut mutations, at(12));

        let record = &mutations[0].record;
        assert_eq!(record.update_date(), Some(at(12)));
        assert_eq!(record.insert_date(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single());
        assert!(!record.changed(INSERT_DATE));
    }

    #[test]
    fn delete_becomes_soft_delete() {
        let id = Uuid::new_v4();
        let mut mutations = vec![PendingMutation::new("orders", stored(id, json!({})), ChangeKind::Delete)];

        let summary = interceptor().stamp(&model(), &mut mutations, at(12));

        assert_eq!(mutations[0].action(), WriteAction::Update);
        assert_eq!(mutations[0].kind(), ChangeKind::Delete);
        assert!(mutations[0].record.is_removed());
        assert_eq!(mutations[0].record.remove_date(), Some(at(12)));
        assert_eq!(summary.soft_deleted, 1);
    }

    #[test]
    fn repeated_delete_keeps_first_remove_date() {
        let id = Uuid::new_v4();
        let record = stored(id, json!({ "is_removed": true, "remove_date": "2024-02-01T00:00:00+00:00" }));
        let mut mutations = vec![PendingMutation::new("orders", record, ChangeKind::Delete)];

        interceptor().stamp(&model(), &mut mutations, at(12));

        assert_eq!(mutations[0].action(), WriteAction::Update);
        assert_eq!(
            mutations[0].record.remove_date(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).single()
        );
    }

    #[test]
    fn non_auditable_types_are_untouched() {
        let mut tracked = Record::from_json(json!({ "value": "abc" })).unwrap();
        tracked.set_id(Uuid::new_v4());
        let before = tracked.clone();
        let mut mutations = vec![
            PendingMutation::new("tokens", tracked.clone(), ChangeKind::Delete),
            PendingMutation::new("unknown", tracked, ChangeKind::Create),
        ];

        let summary = interceptor().stamp(&model(), &mut mutations, at(12));

        assert_eq!(mutations[0].record, before);
        assert_eq!(mutations[0].action(), WriteAction::Delete);
        assert_eq!(mutations[1].record.get(INSERT_DATE), None);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.stamped(), 0);
    }

    #[test]
    fn one_timestamp_per_pass() {
        let id = Uuid::new_v4();
        let mutations = vec![
            PendingMutation::new("orders", Record::from_json(json!({ "price": 1 })).unwrap(), ChangeKind::Create),
            PendingMutation::new("orders", stored(id, json!({})), ChangeKind::Update),
        ];
        let mut ctx = SaveContext::new(Arc::new(model()), mutations);

        interceptor().before_save(&mut ctx).unwrap();

        assert_eq!(ctx.mutations[0].record.insert_date(), Some(at(12)));
        assert_eq!(ctx.mutations[1].record.update_date(), Some(at(12)));
        assert_eq!(
            ctx.get_metadata::<AuditSummary>(),
            Some(&AuditSummary { inserted: 1, updated: 1, soft_deleted: 0, skipped: 0 })
        );
    }
}
