use futures::TryFutureExt;
use tokio::time::Instant;

use crate::attempt::RetryAttempt;
use crate::config::RetryConfig;
use crate::context::RetryContext;
use crate::error::{Error, ErrorKind};
use crate::future::{Operation, Wait};
use crate::result::RetryResult;
use crate::retry_strategy::RetryStrategy;

type Output<O> = <<O as Operation>::Future as futures::TryFuture>::Ok;

/// Runs an [Operation] until it succeeds or its [RetryStrategy] gives up.
///
/// The executor holds no per-sequence state: every call works on the
/// [RetryContext] it is handed, so one executor can serve any number of
/// concurrent sequences as long as each has its own context.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor<S> {
    strategy: S,
}

impl<S: RetryStrategy> RetryExecutor<S> {
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Runs `operation` against `context`, which is mutated in place.
    ///
    /// Never fails: a sequence that ends without success is reported through
    /// [RetryResult::is_successful] and [RetryResult::final_error]. Cancelling
    /// the context's token while waiting between attempts ends the sequence
    /// with an [Interrupted](crate::ErrorKind::Interrupted) final error.
    pub async fn execute<O: Operation>(
        &self,
        mut operation: O,
        context: &mut RetryContext,
    ) -> RetryResult<Output<O>> {
        #[cfg(feature = "log")]
        log::debug!(
            "starting {:?} with {} strategy, up to {} attempts (id: {})",
            context.operation_type(),
            self.strategy.strategy_name(),
            context.max_attempts(),
            context.retry_id()
        );

        let mut result = RetryResult::new(context.start_time(), context.config().clone());
        let already_ran = context
            .last_attempt()
            .is_some_and(|attempt| attempt.attempt_number() >= context.current_attempt());
        if context.current_attempt() > context.max_attempts() || (already_ran && !context.can_retry()) {
            let error = context
                .last_attempt()
                .and_then(RetryAttempt::error)
                .cloned()
                .unwrap_or_else(|| Error::msg(ErrorKind::Unknown, "all attempts failed"));

            #[cfg(feature = "log")]
            log::warn!(
                "{:?} has no attempts left (id: {}): {error}",
                context.operation_type(),
                context.retry_id()
            );
            result.mark_failed(error, Instant::now());
            return result;
        }
        if already_ran {
            context.increment_attempt();
        }

        loop {
            let mut attempt = RetryAttempt::start(context.current_attempt());
            match TryFutureExt::into_future(operation.call()).await {
                Ok(value) => {
                    attempt.mark_successful();
                    context.add_attempt(attempt.clone());
                    result.add_attempt(attempt);
                    result.mark_successful(value, Instant::now());

                    #[cfg(feature = "log")]
                    log::info!(
                        "{:?} succeeded on attempt {} (id: {})",
                        context.operation_type(),
                        context.current_attempt(),
                        context.retry_id()
                    );
                    break;
                }
                Err(error) => {
                    attempt.mark_failed(error.clone());
                    context.add_attempt(attempt.clone());
                    result.add_attempt(attempt);

                    #[cfg(feature = "log")]
                    log::warn!(
                        "attempt {} of {:?} failed (id: {}): {error}",
                        context.current_attempt(),
                        context.operation_type(),
                        context.retry_id()
                    );

                    if !self.strategy.should_retry(context) {
                        #[cfg(feature = "log")]
                        log::error!(
                            "{:?} failed for good after {} attempts (id: {}): {error}",
                            context.operation_type(),
                            context.current_attempt(),
                            context.retry_id()
                        );
                        result.mark_failed(error, Instant::now());
                        break;
                    }

                    let delay = self.strategy.calculate_delay(context);
                    #[cfg(feature = "log")]
                    log::debug!(
                        "waiting {delay:?} before retrying {:?} (id: {})",
                        context.operation_type(),
                        context.retry_id()
                    );

                    if let Err(interrupted) = Wait::new(delay, context.cancellation_token().clone()).await {
                        #[cfg(feature = "log")]
                        log::error!(
                            "retry of {:?} interrupted (id: {})",
                            context.operation_type(),
                            context.retry_id()
                        );
                        result.mark_failed(interrupted, Instant::now());
                        break;
                    }
                    context.increment_attempt();
                }
            }
        }

        #[cfg(feature = "log")]
        log::info!("finished {:?} (id: {}): {result}", context.operation_type(), context.retry_id());
        result
    }

    /// Runs `operation` in a fresh context tagged with the given identifiers,
    /// using the default config limited to this strategy's attempt ceiling.
    pub async fn execute_for<O: Operation>(
        &self,
        operation: O,
        operation_type: &str,
        entity_id: i64,
        integration_type: &str,
    ) -> RetryResult<Output<O>> {
        let mut context = RetryContext::builder()
            .operation_type(operation_type)
            .entity_id(entity_id)
            .integration_type(integration_type)
            .max_attempts(self.strategy.max_attempts())
            .build();
        self.execute(operation, &mut context).await
    }

    /// Like [execute_for](RetryExecutor::execute_for) with an explicit config
    pub async fn execute_for_with_config<O: Operation>(
        &self,
        operation: O,
        operation_type: &str,
        entity_id: i64,
        integration_type: &str,
        config: RetryConfig,
    ) -> RetryResult<Output<O>> {
        let mut context = RetryContext::builder()
            .operation_type(operation_type)
            .entity_id(entity_id)
            .integration_type(integration_type)
            .config(config)
            .build();
        self.execute(operation, &mut context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fail, ExponentialBackoffRetryStrategy, FixedDelayRetryStrategy};
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(5))
            .enable_jitter(false)
            .build()
            .unwrap()
    }

    fn executor(max_attempts: u32) -> RetryExecutor<ExponentialBackoffRetryStrategy> {
        RetryExecutor::new(ExponentialBackoffRetryStrategy::new(config(max_attempts)))
    }

    /// Delegates to an exponential strategy and counts delay computations
    struct CountingStrategy {
        inner: ExponentialBackoffRetryStrategy,
        delays: AtomicUsize,
    }

    impl RetryStrategy for CountingStrategy {
        fn calculate_delay(&self, context: &RetryContext) -> Duration {
            self.delays.fetch_add(1, Ordering::SeqCst);
            self.inner.calculate_delay(context)
        }

        fn max_attempts(&self) -> u32 {
            self.inner.max_attempts()
        }

        fn is_retryable(&self, error: Option<&Error>) -> bool {
            self.inner.is_retryable(error)
        }

        fn strategy_name(&self) -> &'static str {
            "Counting"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let mut context = RetryContext::new(config(3));
        let result = executor(3)
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, Error>("board saved") }
                },
                &mut context,
            )
            .await;

        assert!(result.is_successful());
        assert_eq!(result.value(), Some(&"board saved"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.total_attempts(), 1);
        assert_eq!(result.successful_attempts_count(), 1);
        assert_eq!(result.failed_attempts_count(), 0);
        assert!(result.final_error().is_none());
        assert!(!result.is_in_progress());

        let attempt = &result.attempts()[0];
        assert_eq!(attempt.attempt_number(), 1);
        assert!(attempt.is_successful());
        assert!(attempt.end_time().is_some());
        assert!(attempt.duration().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let strategy = CountingStrategy {
            inner: ExponentialBackoffRetryStrategy::new(config(3)),
            delays: AtomicUsize::new(0),
        };
        let executor = RetryExecutor::new(&strategy);
        let mut context = RetryContext::new(config(3));
        let started = Instant::now();

        let result = executor
            .execute(
                || {
                    let call = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if call == 0 {
                            fail!(ErrorKind::Connect, "tasks api unreachable");
                        }
                        Ok(call)
                    }
                },
                &mut context,
            )
            .await;

        assert!(result.is_successful());
        assert_eq!(result.value(), Some(&1));
        assert_eq!(result.total_attempts(), 2);
        assert_eq!(result.successful_attempts_count(), 1);
        assert_eq!(result.failed_attempts_count(), 1);
        assert_eq!(strategy.delays.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(context.current_attempt(), 2);
        assert!(context.last_attempt_time().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let mut context = RetryContext::new(config(2));
        let result = executor(2)
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(Error::msg(ErrorKind::Io, "Always fails")) }
                },
                &mut context,
            )
            .await;

        assert!(!result.is_successful());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.total_attempts(), 2);
        assert_eq!(result.successful_attempts_count(), 0);
        assert_eq!(result.failed_attempts_count(), 2);
        assert_eq!(result.error_message(), Some("Always fails"));
        assert_eq!(result.final_error().map(Error::kind), Some(&ErrorKind::Io));
        assert!(result.value().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_failure_is_attempted_once() {
        let calls = AtomicU32::new(0);
        let mut context = RetryContext::new(config(5));
        let result = executor(5)
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(Error::msg(ErrorKind::InvalidArgument, "card title is empty")) }
                },
                &mut context,
            )
            .await;

        assert!(!result.is_successful());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.total_attempts(), 1);
        assert_eq!(result.failed_attempts_count(), 1);
        assert_eq!(result.error_message(), Some("card title is empty"));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_follow_the_backoff() {
        let calls = AtomicU32::new(0);
        let mut context = RetryContext::new(config(4));
        let result = executor(4)
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(Error::msg(ErrorKind::Timeout, "slow")) }
                },
                &mut context,
            )
            .await;

        // 100ms, 200ms and 400ms between the four attempts
        let starts: Vec<_> = result.attempts().iter().map(RetryAttempt::start_time).collect();
        assert_eq!(starts.len(), 4);
        assert!(starts[1] - starts[0] >= Duration::from_millis(100));
        assert!(starts[2] - starts[1] >= Duration::from_millis(200));
        assert!(starts[3] - starts[2] >= Duration::from_millis(400));
        assert!(result.total_duration().unwrap() >= Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_executor() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(FixedDelayRetryStrategy::new(config(3)));
        let mut context = RetryContext::new(config(3));
        let result = executor
            .execute(
                || {
                    let call = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if call < 2 {
                            return Err(Error::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout")));
                        }
                        Ok(call)
                    }
                },
                &mut context,
            )
            .await;

        assert!(result.is_successful());
        assert_eq!(result.total_attempts(), 3);
        let starts: Vec<_> = result.attempts().iter().map(RetryAttempt::start_time).collect();
        assert!(starts[2] - starts[1] >= Duration::from_millis(100));
        assert!(starts[2] - starts[1] < Duration::from_millis(200));
        assert_eq!(result.attempts()[0].error_code(), Some("SocketTimeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn history_matches_context() {
        let calls = AtomicU32::new(0);
        let mut context = RetryContext::new(config(3));
        let result = executor(3)
            .execute(
                || {
                    let call = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        match call {
                            0 => Err(Error::msg(ErrorKind::Io, "first")),
                            1 => Err(Error::msg(ErrorKind::Completion, "second")),
                            _ => Ok(()),
                        }
                    }
                },
                &mut context,
            )
            .await;

        let from_context: Vec<_> =
            context.attempts().iter().map(|a| (a.attempt_number(), a.start_time(), a.outcome())).collect();
        let from_result: Vec<_> =
            result.attempts().iter().map(|a| (a.attempt_number(), a.start_time(), a.outcome())).collect();
        assert_eq!(from_context, from_result);
        let numbers: Vec<_> = from_result.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(from_result.windows(2).all(|pair| pair[0].1 <= pair[1].1));
        assert_eq!(result.attempts()[1].error_message(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn time_budget_suppresses_next_retry() {
        let config = RetryConfig::builder()
            .max_attempts(10)
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(1))
            .enable_jitter(false)
            .max_retry_duration(Duration::from_millis(2500))
            .build()
            .unwrap();
        let executor = RetryExecutor::new(FixedDelayRetryStrategy::new(config.clone()));
        let mut context = RetryContext::new(config);
        let result = executor
            .execute(
                || async {
                    // the budget never interrupts a running attempt
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Err::<(), _>(Error::msg(ErrorKind::Io, "still down"))
                },
                &mut context,
            )
            .await;

        // attempts end at 0.5s, 2.0s and 3.5s; the last one is past the budget
        assert!(!result.is_successful());
        assert_eq!(result.total_attempts(), 3);
        assert_eq!(result.error_message(), Some("still down"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_waiting() {
        let token = CancellationToken::new();
        token.cancel();
        let mut context = RetryContext::builder().config(config(3)).cancellation_token(token).build();
        let result = executor(3)
            .execute(|| async { Err::<(), _>(Error::msg(ErrorKind::Io, "down")) }, &mut context)
            .await;

        assert!(!result.is_successful());
        assert_eq!(result.total_attempts(), 1);
        assert_eq!(result.final_error().map(Error::kind), Some(&ErrorKind::Interrupted));
        assert_eq!(result.error_message(), Some("retry interrupted"));
        assert_eq!(result.attempts()[0].error_message(), Some("down"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_while_waiting() {
        let token = CancellationToken::new();
        let config = RetryConfig::builder()
            .initial_delay(Duration::from_secs(60))
            .enable_jitter(false)
            .build()
            .unwrap();
        let mut context = RetryContext::builder().config(config.clone()).cancellation_token(token.clone()).build();
        let executor = RetryExecutor::new(ExponentialBackoffRetryStrategy::new(config));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });
        let calls = AtomicU32::new(0);
        let result = executor
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(Error::msg(ErrorKind::Connect, "refused")) }
                },
                &mut context,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.final_error().map(Error::kind), Some(&ErrorKind::Interrupted));
        assert!(result.total_duration().unwrap() < Duration::from_secs(60));
        assert_eq!(context.current_attempt(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tagged_contexts() {
        let executor = RetryExecutor::new(ExponentialBackoffRetryStrategy::new(config(1)));
        let calls = AtomicU32::new(0);
        let result = executor
            .execute_for(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(Error::msg(ErrorKind::Io, "down")) }
                },
                "sync_calendar",
                12,
                "google_calendar",
            )
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.config(), &RetryConfig::default());

        let custom = config(2);
        let result = executor
            .execute_for_with_config(
                || async { Ok::<_, Error>(5) },
                "create_task",
                12,
                "google_tasks",
                custom,
            )
            .await;
        assert_eq!(result.into_result().unwrap(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn io_errors_propagate_with_question_mark() {
        async fn read_board() -> Result<String, Error> {
            let bytes = tokio::fs::read("/definitely/not/here/board.json").await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }

        let mut context = RetryContext::new(config(2));
        let result = executor(2).execute(read_board, &mut context).await;
        assert!(!result.is_successful());
        assert_eq!(result.attempts()[0].error_code(), Some("Io"));
        assert_eq!(result.total_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_context_is_not_run_again() {
        let calls = AtomicU32::new(0);
        let executor = executor(2);
        let mut context = RetryContext::new(config(2));
        let operation = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::msg(ErrorKind::Io, "sync queue offline")) }
        };

        let first = executor.execute(operation, &mut context).await;
        assert_eq!(first.total_attempts(), 2);

        let second = executor.execute(operation, &mut context).await;
        assert!(!second.is_successful());
        assert!(!second.is_in_progress());
        assert_eq!(second.total_attempts(), 0);
        assert_eq!(second.error_message(), Some("sync queue offline"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let numbers: Vec<_> = context.attempts().iter().map(RetryAttempt::attempt_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(context.current_attempt(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_past_the_ceiling_fails_without_running() {
        let calls = AtomicU32::new(0);
        let mut context = RetryContext::builder().max_attempts(2).current_attempt(3).build();
        let result = executor(2)
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, Error>(()) }
                },
                &mut context,
            )
            .await;

        assert!(!result.is_successful());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.final_error().map(Error::kind), Some(&ErrorKind::Unknown));
        assert_eq!(result.error_message(), Some("all attempts failed"));
        assert!(!context.has_attempts());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_context_resumes_with_the_next_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let executor = executor(3);
        let mut context = RetryContext::builder().config(config(3)).cancellation_token(token).build();

        let interrupted = executor
            .execute(|| async { Err::<(), _>(Error::msg(ErrorKind::Io, "board locked")) }, &mut context)
            .await;
        assert_eq!(interrupted.final_error().map(Error::kind), Some(&ErrorKind::Interrupted));
        assert_eq!(context.current_attempt(), 1);

        let resumed = executor.execute(|| async { Ok::<_, Error>("unlocked") }, &mut context).await;
        assert!(resumed.is_successful());
        assert_eq!(resumed.attempts()[0].attempt_number(), 2);

        let numbers: Vec<_> = context.attempts().iter().map(RetryAttempt::attempt_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn concurrent_sequences_are_independent() {
        let executor = std::sync::Arc::new(RetryExecutor::new(ExponentialBackoffRetryStrategy::new(
            RetryConfig::builder()
                .initial_delay(Duration::from_millis(1))
                .max_delay(Duration::from_millis(1))
                .enable_jitter(false)
                .build()
                .unwrap(),
        )));

        let handles: Vec<_> = (0..4_i64)
            .map(|entity| {
                let executor = executor.clone();
                tokio::spawn(async move {
                    let mut context = RetryContext::builder().entity_id(entity).build();
                    let mut remaining_failures = entity;
                    let result = executor
                        .execute(
                            move || {
                                let fail = remaining_failures > 0;
                                remaining_failures -= 1;
                                async move {
                                    if fail {
                                        fail!(ErrorKind::Io, "entity {entity} not ready");
                                    }
                                    Ok(entity)
                                }
                            },
                            &mut context,
                        )
                        .await;
                    (entity, result.total_attempts(), result.is_successful())
                })
            })
            .collect();

        for handle in handles {
            let (entity, attempts, successful) = handle.await.unwrap();
            // default config allows three attempts
            assert_eq!(successful, entity < 3, "entity {entity}");
            assert_eq!(attempts as i64, (entity + 1).min(3), "entity {entity}");
        }
    }
}
