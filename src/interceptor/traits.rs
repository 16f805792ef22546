use crate::interceptor::context::SaveContext;
use crate::interceptor::error::InterceptorError;
use crate::types::ChangeKind;

/// Hook invoked with the pending mutations of a commit, before they are
/// compiled into writes.
///
/// `before_save` runs synchronously and must not perform I/O: the async
/// commit path calls it before its first `.await`.
pub trait Interceptor: Send + Sync {
    /// Interceptor name for logging and errors
    fn name(&self) -> &'static str;

    /// Lower numbers execute first
    fn priority(&self) -> u8 {
        50
    }

    /// Whether any mutation of this kind is of interest
    fn applies_to_kind(&self, _kind: ChangeKind) -> bool {
        true
    }

    fn before_save(&self, ctx: &mut SaveContext) -> Result<(), InterceptorError>;
}
