use crate::attempt::RetryAttempt;
use crate::config::RetryConfig;
use crate::error::Error;
use crate::metadata::Metadata;
use std::any::Any;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of a whole retry sequence, returned by
/// [RetryExecutor::execute](crate::RetryExecutor::execute).
///
/// Holds the full attempt history regardless of whether the sequence
/// succeeded, the policy that was in force, and either the operation's
/// value or the final error.
#[derive(Debug)]
pub struct RetryResult<T> {
    successful: bool,
    value: Option<T>,
    total_attempts: usize,
    attempts: Vec<RetryAttempt>,
    start_time: Instant,
    end_time: Option<Instant>,
    total_duration: Option<Duration>,
    final_error: Option<Error>,
    error_message: Option<String>,
    config: RetryConfig,
    metadata: Metadata,
}

impl<T> RetryResult<T> {
    pub(crate) fn new(start_time: Instant, config: RetryConfig) -> Self {
        Self {
            successful: false,
            value: None,
            total_attempts: 0,
            attempts: Vec::new(),
            start_time,
            end_time: None,
            total_duration: None,
            final_error: None,
            error_message: None,
            config,
            metadata: Metadata::default(),
        }
    }

    pub(crate) fn add_attempt(&mut self, attempt: RetryAttempt) {
        self.attempts.push(attempt);
        self.total_attempts = self.attempts.len();
    }

    pub(crate) fn mark_successful(&mut self, value: T, end_time: Instant) {
        self.finish(end_time);
        self.successful = true;
        self.value = Some(value);
        self.final_error = None;
        self.error_message = None;
    }

    pub(crate) fn mark_failed(&mut self, error: Error, end_time: Instant) {
        self.finish(end_time);
        self.successful = false;
        self.value = None;
        self.error_message = Some(error.message());
        self.final_error = Some(error);
    }

    fn finish(&mut self, end_time: Instant) {
        self.end_time = Some(end_time);
        self.total_duration = Some(end_time.saturating_duration_since(self.start_time));
    }

    pub fn is_successful(&self) -> bool {
        self.successful
    }

    /// The operation's value, present only on success
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Collapses the sequence into its value or its final error
    pub fn into_result(self) -> Result<T, Error> {
        match (self.value, self.final_error) {
            (Some(value), _) => Ok(value),
            (None, Some(error)) => Err(error),
            (None, None) => Err(Error::msg(crate::ErrorKind::Unknown, "retry sequence did not finish")),
        }
    }

    pub fn total_attempts(&self) -> usize {
        self.total_attempts
    }

    pub fn attempts(&self) -> &[RetryAttempt] {
        &self.attempts
    }

    pub fn last_attempt(&self) -> Option<&RetryAttempt> {
        self.attempts.last()
    }

    pub fn first_successful_attempt(&self) -> Option<&RetryAttempt> {
        self.attempts.iter().find(|attempt| attempt.is_successful())
    }

    pub fn successful_attempts_count(&self) -> usize {
        self.attempts.iter().filter(|attempt| attempt.is_successful()).count()
    }

    pub fn failed_attempts_count(&self) -> usize {
        self.attempts.iter().filter(|attempt| attempt.is_failed()).count()
    }

    /// Mean of the recorded attempt durations, zero without attempts
    pub fn average_attempt_duration(&self) -> Duration {
        if self.attempts.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.attempts.iter().filter_map(RetryAttempt::duration).sum();
        total / self.attempts.len() as u32
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn end_time(&self) -> Option<Instant> {
        self.end_time
    }

    pub fn total_duration(&self) -> Option<Duration> {
        self.total_duration
    }

    pub fn total_duration_millis(&self) -> u128 {
        self.total_duration.map_or(0, |d| d.as_millis())
    }

    pub fn is_in_progress(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn final_error(&self) -> Option<&Error> {
        self.final_error.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn insert_metadata<V: Any + Send + Sync>(&mut self, key: impl Into<String>, value: V) {
        self.metadata.insert(key, value);
    }

    pub fn get_metadata<V: Any>(&self, key: &str) -> Option<&V> {
        self.metadata.get(key)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl<T> Display for RetryResult<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_in_progress() {
            write!(f, "retry in progress: {} attempts made", self.total_attempts)
        } else if self.successful {
            write!(f, "retry succeeded: {} attempts in {}ms", self.total_attempts, self.total_duration_millis())
        } else {
            write!(
                f,
                "retry failed after {} attempts in {}ms: {}",
                self.total_attempts,
                self.total_duration_millis(),
                self.error_message.as_deref().unwrap_or("unknown error")
            )
        }
    }
}
