// Commit error taxonomy
use thiserror::Error;

use crate::database::manager::DatabaseError;
use crate::interceptor::InterceptorError;
use crate::tracking::TrackingError;

/// Failure of a `save_changes*` call. Pending mutations stay tracked on every
/// variant, so the commit can be retried.
#[derive(Debug, Error)]
pub enum SaveError {
    /// Engine failure, surfaced unchanged
    #[error(transparent)]
    Store(#[from] DatabaseError),

    #[error(transparent)]
    Interceptor(#[from] InterceptorError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("Commit cancelled")]
    Cancelled,
}

impl SaveError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SaveError::Cancelled | SaveError::Store(DatabaseError::Cancelled))
    }
}
