pub mod manager;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use record::{ChangeType, FieldChange, Record, RecordError};
pub use store::{AsyncStore, Store, WriteCommand};
