use crate::attempt::RetryAttempt;
use crate::config::RetryConfig;
use crate::metadata::Metadata;
use std::any::Any;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Mutable state of one retry sequence.
///
/// A context belongs to a single [execute](crate::RetryExecutor::execute)
/// call, which mutates it in place. Build a fresh one for every sequence.
/// Use [snapshot](RetryContext::snapshot) to hand progress to other tasks.
#[derive(Debug)]
pub struct RetryContext {
    retry_id: String,
    current_attempt: u32,
    max_attempts: u32,
    operation_type: Option<String>,
    entity_id: Option<i64>,
    integration_type: Option<String>,
    start_time: Instant,
    last_attempt_time: Option<Instant>,
    attempts: Vec<RetryAttempt>,
    config: RetryConfig,
    metadata: Metadata,
    cancellation: CancellationToken,
}

impl Default for RetryContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryContext {
    pub fn builder() -> RetryContextBuilder {
        RetryContextBuilder::default()
    }

    pub fn new(config: RetryConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// `retry-` followed by eight hex digits
    pub fn generate_id() -> String {
        let uuid = Uuid::new_v4().simple().to_string();
        format!("retry-{}", &uuid[..8])
    }

    /// `false` once the current attempt reached the ceiling
    pub fn can_retry(&self) -> bool {
        self.current_attempt < self.max_attempts
    }

    pub fn increment_attempt(&mut self) {
        self.current_attempt += 1;
        self.last_attempt_time = Some(Instant::now());
    }

    pub fn add_attempt(&mut self, attempt: RetryAttempt) {
        self.attempts.push(attempt);
    }

    pub fn last_attempt(&self) -> Option<&RetryAttempt> {
        self.attempts.last()
    }

    pub fn has_attempts(&self) -> bool {
        !self.attempts.is_empty()
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.len()
    }

    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.start_time)
    }

    /// Only meaningful when the config sets a `max_retry_duration`
    pub fn has_exceeded_time_limit(&self) -> bool {
        match self.config.max_retry_duration() {
            Some(limit) => self.elapsed() > limit,
            None => false,
        }
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

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn retry_id(&self) -> &str {
        &self.retry_id
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn operation_type(&self) -> Option<&str> {
        self.operation_type.as_deref()
    }

    pub fn entity_id(&self) -> Option<i64> {
        self.entity_id
    }

    pub fn integration_type(&self) -> Option<&str> {
        self.integration_type.as_deref()
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn last_attempt_time(&self) -> Option<Instant> {
        self.last_attempt_time
    }

    pub fn attempts(&self) -> &[RetryAttempt] {
        &self.attempts
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Cancelling this token interrupts the wait between attempts
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn snapshot(&self) -> RetrySnapshot {
        RetrySnapshot {
            retry_id: self.retry_id.clone(),
            current_attempt: self.current_attempt,
            max_attempts: self.max_attempts,
            elapsed: self.elapsed(),
            attempts: self.attempts.clone(),
        }
    }
}

/// Read-only copy of a [RetryContext]'s progress
#[derive(Debug, Clone)]
pub struct RetrySnapshot {
    pub retry_id: String,
    pub current_attempt: u32,
    pub max_attempts: u32,
    pub elapsed: Duration,
    pub attempts: Vec<RetryAttempt>,
}

#[derive(Debug, Default)]
pub struct RetryContextBuilder {
    retry_id: Option<String>,
    current_attempt: Option<u32>,
    max_attempts: Option<u32>,
    operation_type: Option<String>,
    entity_id: Option<i64>,
    integration_type: Option<String>,
    start_time: Option<Instant>,
    config: Option<RetryConfig>,
    metadata: Metadata,
    cancellation: Option<CancellationToken>,
}

impl RetryContextBuilder {
    pub fn retry_id(mut self, retry_id: impl Into<String>) -> Self {
        self.retry_id = Some(retry_id.into());
        self
    }

    pub fn current_attempt(mut self, current_attempt: u32) -> Self {
        self.current_attempt = Some(current_attempt);
        self
    }

    /// Overrides the ceiling taken from the config
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn operation_type(mut self, operation_type: impl Into<String>) -> Self {
        self.operation_type = Some(operation_type.into());
        self
    }

    pub fn entity_id(mut self, entity_id: i64) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn integration_type(mut self, integration_type: impl Into<String>) -> Self {
        self.integration_type = Some(integration_type.into());
        self
    }

    pub fn start_time(mut self, start_time: Instant) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn config(mut self, config: RetryConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn metadata<V: Any + Send + Sync>(mut self, key: impl Into<String>, value: V) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn build(self) -> RetryContext {
        let config = self.config.unwrap_or_default();
        RetryContext {
            retry_id: self.retry_id.unwrap_or_else(RetryContext::generate_id),
            current_attempt: self.current_attempt.unwrap_or(1),
            max_attempts: self.max_attempts.unwrap_or(config.max_attempts()),
            operation_type: self.operation_type,
            entity_id: self.entity_id,
            integration_type: self.integration_type,
            start_time: self.start_time.unwrap_or_else(Instant::now),
            last_attempt_time: None,
            attempts: Vec::new(),
            config,
            metadata: self.metadata,
            cancellation: self.cancellation.unwrap_or_default(),
        }
    }
}
