// Persistence seam: the write batch a commit hands to the storage engine
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::database::manager::DatabaseError;

/// One physical write, compiled from an intercepted pending mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WriteCommand {
    Insert {
        table: String,
        id: Uuid,
        values: Map<String, Value>,
    },
    /// Writes only the listed fields; other columns keep their stored values
    Update {
        table: String,
        id: Uuid,
        values: Map<String, Value>,
        /// Fields of `values` written only while the stored value is null
        #[serde(skip_serializing_if = "Vec::is_empty")]
        set_once: Vec<String>,
    },
    Delete {
        table: String,
        id: Uuid,
    },
}

impl WriteCommand {
    pub fn table(&self) -> &str {
        match self {
            WriteCommand::Insert { table, .. }
            | WriteCommand::Update { table, .. }
            | WriteCommand::Delete { table, .. } => table,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            WriteCommand::Insert { id, .. }
            | WriteCommand::Update { id, .. }
            | WriteCommand::Delete { id, .. } => *id,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, WriteCommand::Delete { .. })
    }
}

/// Synchronous storage engine
pub trait Store {
    /// Apply the whole batch or nothing. Returns the number of affected records.
    fn execute(&mut self, batch: &[WriteCommand]) -> Result<u64, DatabaseError>;
}

/// Asynchronous storage engine
#[async_trait]
pub trait AsyncStore: Send + Sync {
    /// Apply the whole batch or nothing. `cancel` comes straight from the
    /// caller of the commit; stores report an observed cancellation as
    /// `DatabaseError::Cancelled`.
    async fn execute(
        &self,
        batch: &[WriteCommand],
        cancel: CancellationToken,
    ) -> Result<u64, DatabaseError>;
}
