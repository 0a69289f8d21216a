use thiserror::Error;

/// Boxed error produced by a retried action, or by the retry loop itself.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a [`Context`](crate::Context) stopped a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}
