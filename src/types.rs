/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Change kind of a pending mutation, as requested by application code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// Physical write a pending mutation turns into once interceptors have run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteAction {
    Insert,
    Update,
    Delete,
}

impl From<ChangeKind> for WriteAction {
    fn from(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Create => WriteAction::Insert,
            ChangeKind::Update => WriteAction::Update,
            ChangeKind::Delete => WriteAction::Delete,
        }
    }
}
