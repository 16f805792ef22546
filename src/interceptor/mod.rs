// Pre-commit interception pipeline
pub mod audit;
pub mod clock;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod traits;

pub use audit::{AuditInterceptor, AuditSummary};
pub use clock::{Clock, SystemClock};
pub use context::SaveContext;
pub use error::InterceptorError;
pub use pipeline::InterceptorPipeline;
pub use traits::Interceptor;
