pub mod exponential;
pub mod fixed;

use crate::context::RetryContext;
use crate::error::Error;
pub use exponential::ExponentialBackoffRetryStrategy;
pub use fixed::FixedDelayRetryStrategy;
use std::time::Duration;

/// Decides whether a failed attempt is followed by another one and how long
/// to wait before it.
///
/// Implement this trait to plug a custom policy into
/// [RetryExecutor](crate::RetryExecutor).
pub trait RetryStrategy {
    /// Wait before the attempt following `context.current_attempt()`
    fn calculate_delay(&self, context: &RetryContext) -> Duration;

    /// Stops on any of: the attempt ceiling was reached, the time budget is
    /// spent, or the last recorded attempt failed with a non-retryable error.
    fn should_retry(&self, context: &RetryContext) -> bool {
        if !context.can_retry() || context.has_exceeded_time_limit() {
            return false;
        }
        match context.last_attempt().and_then(|attempt| attempt.error()) {
            Some(error) => self.is_retryable(Some(error)),
            None => true,
        }
    }

    fn max_attempts(&self) -> u32;

    /// `None` is never retryable
    fn is_retryable(&self, error: Option<&Error>) -> bool;

    fn strategy_name(&self) -> &'static str;
}

impl<S: RetryStrategy + ?Sized> RetryStrategy for &S {
    fn calculate_delay(&self, context: &RetryContext) -> Duration {
        (**self).calculate_delay(context)
    }

    fn should_retry(&self, context: &RetryContext) -> bool {
        (**self).should_retry(context)
    }

    fn max_attempts(&self) -> u32 {
        (**self).max_attempts()
    }

    fn is_retryable(&self, error: Option<&Error>) -> bool {
        (**self).is_retryable(error)
    }

    fn strategy_name(&self) -> &'static str {
        (**self).strategy_name()
    }
}

impl<S: RetryStrategy + ?Sized> RetryStrategy for Box<S> {
    fn calculate_delay(&self, context: &RetryContext) -> Duration {
        (**self).calculate_delay(context)
    }

    fn should_retry(&self, context: &RetryContext) -> bool {
        (**self).should_retry(context)
    }

    fn max_attempts(&self) -> u32 {
        (**self).max_attempts()
    }

    fn is_retryable(&self, error: Option<&Error>) -> bool {
        (**self).is_retryable(error)
    }

    fn strategy_name(&self) -> &'static str {
        (**self).strategy_name()
    }
}
