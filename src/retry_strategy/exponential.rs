use crate::config::RetryConfig;
use crate::context::RetryContext;
use crate::error::Error;
use crate::RetryStrategy;
use std::time::Duration;

/// `initial_delay * multiplier^(attempt - 1)` capped at `max_delay`, with
/// optional jitter, see [RetryConfig::calculate_delay]
#[derive(Debug, Clone, Default)]
pub struct ExponentialBackoffRetryStrategy {
    config: RetryConfig,
}

impl ExponentialBackoffRetryStrategy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl RetryStrategy for ExponentialBackoffRetryStrategy {
    fn calculate_delay(&self, context: &RetryContext) -> Duration {
        self.config.calculate_delay(context.current_attempt())
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts()
    }

    fn is_retryable(&self, error: Option<&Error>) -> bool {
        self.config.is_retryable(error)
    }

    fn strategy_name(&self) -> &'static str {
        "ExponentialBackoff"
    }
}
