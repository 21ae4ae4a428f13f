//! Retry executor with pluggable strategies.
//!
//! A [RetryExecutor] runs an [Operation] until it succeeds, its
//! [RetryStrategy] gives up, or the wait between attempts is cancelled.
//! Every attempt is recorded, and the whole sequence is reported as a
//! [RetryResult] instead of an error.
//!
//! ```no_run
//! use retry_executor::{
//!     Error, ExponentialBackoffRetryStrategy, RetryConfig, RetryContext, RetryExecutor,
//! };
//!
//! # async fn push_task() -> Result<String, Error> { Ok("task-1".into()) }
//! # async fn example() {
//! let executor = RetryExecutor::new(ExponentialBackoffRetryStrategy::new(RetryConfig::critical()));
//! let mut context = RetryContext::builder()
//!     .config(RetryConfig::critical())
//!     .operation_type("create_task")
//!     .entity_id(42)
//!     .build();
//!
//! let result = executor.execute(push_task, &mut context).await;
//! if !result.is_successful() {
//!     eprintln!("{result}");
//! }
//! # }
//! ```
pub mod error;

mod attempt;
mod config;
mod context;
mod executor;
mod future;
mod metadata;
mod result;
mod retry_strategy;

pub use attempt::{AttemptOutcome, RetryAttempt};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use context::{RetryContext, RetryContextBuilder, RetrySnapshot};
pub use error::{Error, ErrorKind, InvalidConfig};
pub use executor::RetryExecutor;
pub use future::{Operation, Wait};
pub use metadata::Metadata;
pub use result::RetryResult;
pub use retry_strategy::{ExponentialBackoffRetryStrategy, FixedDelayRetryStrategy, RetryStrategy};

/// Return early from an operation with an [Error] of the given
/// [kind](ErrorKind), formatting the rest of the arguments as its message
#[macro_export]
macro_rules! fail {
    ($kind:expr, $($arg:tt)+) => {
        return Err($crate::Error::msg($kind, format!($($arg)+)))
    };
}
