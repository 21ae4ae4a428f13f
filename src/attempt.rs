use crate::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    InProgress,
    Successful,
    Failed,
}

/// Record of a single execution of a retried operation.
///
/// An attempt starts in progress and is finalized exactly once, either by
/// [mark_successful](RetryAttempt::mark_successful) or
/// [mark_failed](RetryAttempt::mark_failed). Later calls to either are
/// ignored, so a finalized record never changes.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    attempt_number: u32,
    start_time: Instant,
    end_time: Option<Instant>,
    duration: Option<Duration>,
    outcome: AttemptOutcome,
    error: Option<Error>,
    error_message: Option<String>,
    error_code: Option<String>,
    details: Option<String>,
}

impl RetryAttempt {
    pub fn start(attempt_number: u32) -> Self {
        Self::started_at(attempt_number, Instant::now())
    }

    pub fn started_at(attempt_number: u32, start_time: Instant) -> Self {
        Self {
            attempt_number,
            start_time,
            end_time: None,
            duration: None,
            outcome: AttemptOutcome::InProgress,
            error: None,
            error_message: None,
            error_code: None,
            details: None,
        }
    }

    /// Free-form annotation kept alongside the outcome
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn mark_successful(&mut self) {
        self.mark_successful_at(Instant::now())
    }

    pub fn mark_successful_at(&mut self, end_time: Instant) {
        if self.finish(end_time) {
            self.outcome = AttemptOutcome::Successful;
        }
    }

    pub fn mark_failed(&mut self, error: Error) {
        self.mark_failed_at(error, Instant::now())
    }

    pub fn mark_failed_at(&mut self, error: Error, end_time: Instant) {
        if self.finish(end_time) {
            self.outcome = AttemptOutcome::Failed;
            self.error_message = Some(error.message());
            self.error_code = Some(error.kind().as_str().to_owned());
            self.error = Some(error);
        }
    }

    fn finish(&mut self, end_time: Instant) -> bool {
        if self.end_time.is_some() {
            return false;
        }
        self.end_time = Some(end_time);
        self.duration = Some(end_time.saturating_duration_since(self.start_time));
        true
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn end_time(&self) -> Option<Instant> {
        self.end_time
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Zero while the attempt is still running
    pub fn duration_millis(&self) -> u128 {
        self.duration.map_or(0, |d| d.as_millis())
    }

    pub fn outcome(&self) -> AttemptOutcome {
        self.outcome
    }

    pub fn is_in_progress(&self) -> bool {
        self.outcome == AttemptOutcome::InProgress
    }

    pub fn is_successful(&self) -> bool {
        self.outcome == AttemptOutcome::Successful
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == AttemptOutcome::Failed
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Identifier of the failure's [kind](crate::ErrorKind)
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl Display for RetryAttempt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.outcome {
            AttemptOutcome::InProgress => write!(f, "attempt {} in progress", self.attempt_number),
            AttemptOutcome::Successful => {
                write!(f, "attempt {} succeeded in {}ms", self.attempt_number, self.duration_millis())
            }
            AttemptOutcome::Failed => write!(
                f,
                "attempt {} failed: {}",
                self.attempt_number,
                self.error_message.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}
