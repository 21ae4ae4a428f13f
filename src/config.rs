use crate::error::{Error, ErrorKind, InvalidConfig};
use rand::Rng;
use std::time::Duration;

/// Kinds treated as transient when a config lists nothing at all
const TRANSIENT_KINDS: [ErrorKind; 5] = [
    ErrorKind::Connect,
    ErrorKind::SocketTimeout,
    ErrorKind::Io,
    ErrorKind::Timeout,
    ErrorKind::Completion,
];

const TERMINAL_KINDS: [ErrorKind; 3] =
    [ErrorKind::InvalidArgument, ErrorKind::Security, ErrorKind::Unsupported];

/// Immutable retry policy.
///
/// Build one with [RetryConfig::builder] or start from one of the presets:
/// [default](RetryConfig::default), [critical](RetryConfig::critical) or
/// [fast](RetryConfig::fast). A config never changes after it is built and
/// can be cloned into as many contexts as needed.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    enable_jitter: bool,
    max_retry_duration: Option<Duration>,
    retryable_exceptions: Vec<ErrorKind>,
    non_retryable_exceptions: Vec<ErrorKind>,
}

impl Default for RetryConfig {
    /// 3 attempts, 1s initial delay, 5 min cap, x2 multiplier, jitter on
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5 * 60),
            backoff_multiplier: 2.0,
            enable_jitter: true,
            max_retry_duration: None,
            retryable_exceptions: TRANSIENT_KINDS.to_vec(),
            non_retryable_exceptions: TERMINAL_KINDS.to_vec(),
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder { config: Self::default() }
    }

    /// 5 attempts, 2s initial delay, 10 min cap, x1.5 multiplier, 1 hour budget
    pub fn critical() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10 * 60),
            backoff_multiplier: 1.5,
            max_retry_duration: Some(Duration::from_secs(60 * 60)),
            ..Self::default()
        }
    }

    /// 2 attempts, 500ms initial delay, 5s cap, x2 multiplier, 5 min budget
    pub fn fast() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            max_retry_duration: Some(Duration::from_secs(5 * 60)),
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn enable_jitter(&self) -> bool {
        self.enable_jitter
    }

    pub fn max_retry_duration(&self) -> Option<Duration> {
        self.max_retry_duration
    }

    pub fn retryable_exceptions(&self) -> &[ErrorKind] {
        &self.retryable_exceptions
    }

    pub fn non_retryable_exceptions(&self) -> &[ErrorKind] {
        &self.non_retryable_exceptions
    }

    /// Classifies a failure. The non-retryable list wins over the retryable
    /// one; with both lists empty the built-in transient kinds are retried.
    /// An absent failure is never retryable.
    pub fn is_retryable(&self, error: Option<&Error>) -> bool {
        let Some(error) = error else {
            return false;
        };
        let kind = error.kind();
        if self.retryable_exceptions.is_empty() && self.non_retryable_exceptions.is_empty() {
            return TRANSIENT_KINDS.iter().any(|transient| kind.is_a(transient));
        }
        if self.non_retryable_exceptions.iter().any(|terminal| kind.is_a(terminal)) {
            return false;
        }
        self.retryable_exceptions.iter().any(|retryable| kind.is_a(retryable))
    }

    /// Wait before the attempt following `attempt_number` (1-based).
    ///
    /// `initial_delay * backoff_multiplier^(attempt_number - 1)`, capped at
    /// `max_delay`, then scaled into `[0.5, 1.0]` of itself when jitter is on.
    pub fn calculate_delay(&self, attempt_number: u32) -> Duration {
        let delay = self.backoff_delay(attempt_number);
        if self.enable_jitter {
            jitter(delay)
        } else {
            delay
        }
    }

    fn backoff_delay(&self, attempt_number: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt_number.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        match Duration::try_from_secs_f64(secs) {
            Ok(delay) => delay.min(self.max_delay),
            // overflowed into infinity
            Err(_) => self.max_delay,
        }
    }
}

fn jitter(delay: Duration) -> Duration {
    let factor = rand::rng().random_range(0.5..=1.0);
    delay.mul_f64(factor)
}

/// Builder for [RetryConfig], starting from the default preset
#[derive(Debug, Clone)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    pub fn initial_delay(mut self, initial_delay: Duration) -> Self {
        self.config.initial_delay = initial_delay;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.config.max_delay = max_delay;
        self
    }

    pub fn backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.config.backoff_multiplier = backoff_multiplier;
        self
    }

    pub fn enable_jitter(mut self, enable_jitter: bool) -> Self {
        self.config.enable_jitter = enable_jitter;
        self
    }

    pub fn max_retry_duration(mut self, max_retry_duration: impl Into<Option<Duration>>) -> Self {
        self.config.max_retry_duration = max_retry_duration.into();
        self
    }

    /// Replaces the whole retryable list
    pub fn retryable_exceptions(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.config.retryable_exceptions = kinds.into_iter().collect();
        self
    }

    /// Replaces the whole non-retryable list
    pub fn non_retryable_exceptions(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.config.non_retryable_exceptions = kinds.into_iter().collect();
        self
    }

    /// Appends one kind to the retryable list
    pub fn retryable(mut self, kind: ErrorKind) -> Self {
        self.config.retryable_exceptions.push(kind);
        self
    }

    /// Appends one kind to the non-retryable list
    pub fn non_retryable(mut self, kind: ErrorKind) -> Self {
        self.config.non_retryable_exceptions.push(kind);
        self
    }

    pub fn build(self) -> Result<RetryConfig, InvalidConfig> {
        let config = self.config;
        if config.max_attempts == 0 {
            return Err(InvalidConfig::ZeroAttempts);
        }
        if config.initial_delay > config.max_delay {
            return Err(InvalidConfig::InitialDelayExceedsMax);
        }
        if !config.backoff_multiplier.is_finite() || config.backoff_multiplier < 1.0 {
            return Err(InvalidConfig::Multiplier(config.backoff_multiplier));
        }
        Ok(config)
    }
}
