pub mod config;
pub mod context;
pub mod error;
pub mod policy;
pub mod random;
pub mod retrier;
pub mod retryable;
mod timer;
pub mod try_again;

pub use config::PolicyConfig;
pub use context::Context;
pub use error::{BoxError, ContextError};
pub use policy::{Jitter, Policy};
pub use random::{RandomSource, SharedRng};
pub use retrier::Retrier;
pub use retryable::{
    is_permanent, mark_permanent, mark_temporary, Classified, Marked, Temporary, TemporaryError,
};
pub use try_again::{repeatedly_try, repeatedly_try_value};
