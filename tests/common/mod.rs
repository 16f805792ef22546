#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use entity_audit::{AsyncStore, Clock, DatabaseError, DbContext, Entity, MemoryStore, Model, Store, WriteCommand};

/// Auditable entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer: String,
    pub total: i64,
}

impl Order {
    pub fn new(customer: &str, total: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer: customer.to_string(),
            total,
        }
    }
}

impl Entity for Order {
    const NAME: &'static str = "orders";
    const AUDITABLE: bool = true;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Entity without the audit marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionToken {
    pub id: Uuid,
    pub token: String,
}

impl SessionToken {
    pub fn new(token: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: token.to_string(),
        }
    }
}

impl Entity for SessionToken {
    const NAME: &'static str = "session_tokens";

    fn id(&self) -> Uuid {
        self.id
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
}

/// Always returns the same instant
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Advances one minute on every read, starting at `base_time()`
#[derive(Default)]
pub struct StepClock {
    reads: AtomicI64,
}

impl StepClock {
    pub fn reads(&self) -> i64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Instant returned by the n-th read (0-based)
    pub fn nth(n: i64) -> DateTime<Utc> {
        base_time() + Duration::minutes(n)
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        Self::nth(n)
    }
}

pub fn model() -> Arc<Model> {
    Model::builder()
        .entity::<Order>()
        .entity::<SessionToken>()
        .build_shared()
}

pub fn context_at(at: DateTime<Utc>) -> DbContext<MemoryStore> {
    DbContext::with_clock(model(), MemoryStore::new(), Arc::new(FixedClock(at)))
}

pub fn context_with(store: MemoryStore, clock: Arc<dyn Clock>) -> DbContext<MemoryStore> {
    DbContext::with_clock(model(), store, clock)
}

/// Store that refuses every batch
#[derive(Debug, Default)]
pub struct FailingStore {
    pub attempts: std::sync::atomic::AtomicUsize,
}

impl FailingStore {
    fn fail(&self) -> Result<u64, DatabaseError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DatabaseError::QueryError("disk full".to_string()))
    }
}

impl Store for FailingStore {
    fn execute(&mut self, _batch: &[WriteCommand]) -> Result<u64, DatabaseError> {
        self.fail()
    }
}

#[async_trait]
impl AsyncStore for FailingStore {
    async fn execute(&self, _batch: &[WriteCommand], _cancel: CancellationToken) -> Result<u64, DatabaseError> {
        self.fail()
    }
}

/// Store that waits for cancellation before answering
#[derive(Debug, Default, Clone)]
pub struct BlockingStore;

#[async_trait]
impl AsyncStore for BlockingStore {
    async fn execute(&self, _batch: &[WriteCommand], cancel: CancellationToken) -> Result<u64, DatabaseError> {
        cancel.cancelled().await;
        Err(DatabaseError::Cancelled)
    }
}
