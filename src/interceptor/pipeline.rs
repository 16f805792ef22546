use std::fmt;

use crate::interceptor::context::SaveContext;
use crate::interceptor::error::InterceptorError;
use crate::interceptor::traits::Interceptor;

/// Ordered set of interceptors run before every commit
#[derive(Default)]
pub struct InterceptorPipeline {
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interceptor, keeping the set sorted by priority.
    /// Equal priorities run in registration order.
    pub fn register(&mut self, interceptor: Box<dyn Interceptor>) {
        tracing::debug!(
            "Registered interceptor: {} (priority {})",
            interceptor.name(),
            interceptor.priority()
        );
        let position = self
            .interceptors
            .iter()
            .position(|existing| existing.priority() > interceptor.priority())
            .unwrap_or(self.interceptors.len());
        self.interceptors.insert(position, interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Run every applicable interceptor in order, stopping at the first error
    pub fn run(&self, ctx: &mut SaveContext) -> Result<(), InterceptorError> {
        for interceptor in &self.interceptors {
            let applies = ctx
                .mutations
                .iter()
                .any(|m| interceptor.applies_to_kind(m.kind()));
            if !applies {
                tracing::trace!("Interceptor {} skipped - no applicable mutations", interceptor.name());
                continue;
            }

            if let Err(error) = interceptor.before_save(ctx) {
                tracing::warn!("Interceptor {} failed: {}", interceptor.name(), error);
                return Err(error);
            }
            tracing::trace!("Interceptor {} completed", interceptor.name());
        }
        Ok(())
    }
}

impl fmt::Debug for InterceptorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorPipeline")
            .field("interceptors", &self.names())
            .finish()
    }
}
