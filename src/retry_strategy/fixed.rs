use crate::config::RetryConfig;
use crate::context::RetryContext;
use crate::error::Error;
use crate::RetryStrategy;
use std::time::Duration;

/// Waits `initial_delay` between every two attempts.
///
/// The config's backoff multiplier and jitter are ignored, so the same
/// config can back both this and
/// [ExponentialBackoffRetryStrategy](crate::ExponentialBackoffRetryStrategy)
/// without changing this strategy's timing.
#[derive(Debug, Clone, Default)]
pub struct FixedDelayRetryStrategy {
    config: RetryConfig,
}

impl FixedDelayRetryStrategy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl RetryStrategy for FixedDelayRetryStrategy {
    fn calculate_delay(&self, _context: &RetryContext) -> Duration {
        self.config.initial_delay()
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts()
    }

    fn is_retryable(&self, error: Option<&Error>) -> bool {
        self.config.is_retryable(error)
    }

    fn strategy_name(&self) -> &'static str {
        "FixedDelay"
    }
}
