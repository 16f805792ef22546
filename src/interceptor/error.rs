use thiserror::Error;

/// Raised by an interceptor to abort a commit before anything is written
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InterceptorError {
    #[error("Interceptor '{interceptor}' rejected the commit: {reason}")]
    Rejected { interceptor: String, reason: String },
}

impl InterceptorError {
    pub fn rejected(interceptor: &str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            interceptor: interceptor.to_string(),
            reason: reason.into(),
        }
    }
}
