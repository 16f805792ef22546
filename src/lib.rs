pub mod cli;
pub mod config;
pub mod database;
pub mod db_context;
pub mod error;
pub mod interceptor;
pub mod model;
pub mod tracking;
pub mod types;

pub use database::{AsyncStore, DatabaseError, MemoryStore, PgStore, Record, Store, WriteCommand};
pub use db_context::DbContext;
pub use error::SaveError;
pub use interceptor::{AuditInterceptor, AuditSummary, Clock, Interceptor, InterceptorError, SaveContext, SystemClock};
pub use model::{AuditFields, Entity, Model, ModelBuilder, RemovalState};
pub use tracking::{ChangeTracker, PendingMutation, TrackingError};
pub use types::{ChangeKind, WriteAction};
