use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::model::Model;
use crate::tracking::PendingMutation;
use crate::types::ChangeKind;

/// State that flows through the interceptor pipeline for one commit
#[derive(Debug)]
pub struct SaveContext {
    pub model: Arc<Model>,
    pub mutations: Vec<PendingMutation>,
    pub start_time: Instant,

    // Type-safe metadata storage for cross-interceptor communication
    metadata: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl SaveContext {
    pub fn new(model: Arc<Model>, mutations: Vec<PendingMutation>) -> Self {
        Self {
            model,
            mutations,
            start_time: Instant::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn set_metadata<T: Send + 'static>(&mut self, data: T) {
        self.metadata.insert(TypeId::of::<T>(), Box::new(data));
    }

    pub fn get_metadata<T: Send + 'static>(&self) -> Option<&T> {
        self.metadata
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn get_metadata_mut<T: Send + 'static>(&mut self) -> Option<&mut T> {
        self.metadata
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }

    /// Remove typed metadata and hand ownership back to the caller
    pub fn take_metadata<T: Send + 'static>(&mut self) -> Option<T> {
        self.metadata
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn has_metadata<T: Send + 'static>(&self) -> bool {
        self.metadata.contains_key(&TypeId::of::<T>())
    }

    pub fn has_kind(&self, kind: ChangeKind) -> bool {
        self.mutations.iter().any(|m| m.kind() == kind)
    }

    pub fn count_by_kind(&self, kind: ChangeKind) -> usize {
        self.mutations.iter().filter(|m| m.kind() == kind).count()
    }

    pub fn execution_time(&self) -> Duration {
        self.start_time.elapsed()
    }
}
