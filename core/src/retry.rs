//! Bounded exponential-backoff retry around one request cycle.
//!
//! Only connectivity failures (not connected, connection lost, timed out)
//! are retried. The attempt counter is incremented before the delay is
//! computed, so with the default policy the waits between the three
//! possible retries are `2s`, `4s` and `8s`. Sleeping is injected so the
//! coordinator can run under any executor, or none.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ApiError;
use crate::transport::TransportError;

pub mod defaults {
    use std::time::Duration;

    pub const MAX_RETRIES: u32 = 3;

    pub const BASE_DELAY: Duration = Duration::from_secs(1);
}

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            base_delay: defaults::BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// `base_delay * 2^attempt`, saturating.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Errors the coordinator knows how to classify.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        self.is_connectivity()
    }
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport(e) if e.is_connectivity())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryState {
    #[default]
    Idle,
    Attempting,
    Retrying,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct Retrier {
    policy: RetryPolicy,
    state: RetryState,
    attempts: u32,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Idle,
            attempts: 0,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Operation invocations made by the last run.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Decides what happens after a failed attempt: `Some(delay)` to retry.
    fn on_failure<E: Retryable + fmt::Display>(&mut self, error: &E) -> Option<Duration> {
        let retry = self.attempts - 1;
        if error.is_retryable() && retry < self.policy.max_retries {
            let delay = self.policy.delay_for_attempt(retry + 1);
            self.state = RetryState::Retrying;
            warn!(attempt = self.attempts, ?delay, %error, "connectivity failure, retrying");
            Some(delay)
        } else {
            self.state = RetryState::Failed;
            debug!(attempts = self.attempts, %error, "giving up");
            None
        }
    }

    fn begin_attempt(&mut self) {
        self.state = RetryState::Attempting;
        self.attempts += 1;
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent. The last error is returned as-is.
    pub fn run<T, E>(
        &mut self,
        mut sleep: impl FnMut(Duration),
        mut op: impl FnMut() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: Retryable + fmt::Display,
    {
        self.attempts = 0;
        loop {
            self.begin_attempt();
            match op() {
                Ok(value) => {
                    self.state = RetryState::Succeeded;
                    return Ok(value);
                }
                Err(error) => match self.on_failure(&error) {
                    Some(delay) => sleep(delay),
                    None => return Err(error),
                },
            }
        }
    }

    /// Async form of [`Retrier::run`] with an injected sleep.
    pub async fn run_async_with<T, E, S, SF, F, Fut>(&mut self, mut sleep: S, mut op: F) -> Result<T, E>
    where
        E: Retryable + fmt::Display,
        S: FnMut(Duration) -> SF,
        SF: Future<Output = ()>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.attempts = 0;
        loop {
            self.begin_attempt();
            match op().await {
                Ok(value) => {
                    self.state = RetryState::Succeeded;
                    return Ok(value);
                }
                Err(error) => match self.on_failure(&error) {
                    Some(delay) => sleep(delay).await,
                    None => return Err(error),
                },
            }
        }
    }

    /// Async retry sleeping on the tokio timer.
    pub async fn run_async<T, E, F, Fut>(&mut self, op: F) -> Result<T, E>
    where
        E: Retryable + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_async_with(tokio::time::sleep, op).await
    }
}

/// Blocking retry that sleeps the current thread.
pub fn retry<T, E>(policy: RetryPolicy, op: impl FnMut() -> Result<T, E>) -> Result<T, E>
where
    E: Retryable + fmt::Display,
{
    Retrier::new(policy).run(std::thread::sleep, op)
}

pub async fn retry_async<T, E, F, Fut>(policy: RetryPolicy, op: F) -> Result<T, E>
where
    E: Retryable + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    Retrier::new(policy).run_async(op).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new().base_delay(Duration::from_millis(10))
    }

    #[test]
    fn defaults_are_three_retries_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(RetryPolicy::no_retry().max_retries, 0);
    }

    #[test]
    fn two_connectivity_failures_then_success() {
        let calls = AtomicU32::new(0);
        let mut delays = Vec::new();
        let mut retrier = Retrier::new(policy());

        let result = retrier.run(
            |delay| delays.push(delay),
            || match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(TransportError::not_connected("down")),
                1 => Err(TransportError::timed_out("slow")),
                _ => Ok("done"),
            },
        );

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retrier.attempts(), 3);
        assert_eq!(retrier.state(), RetryState::Succeeded);
        assert_eq!(delays, vec![Duration::from_millis(20), Duration::from_millis(40)]);
    }

    #[test]
    fn non_retryable_error_fails_immediately() {
        let calls = AtomicU32::new(0);
        let mut retrier = Retrier::new(policy());
        let result: Result<(), _> = retrier.run(
            |_| panic!("must not sleep"),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::other("bad certificate"))
            },
        );
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(retrier.state(), RetryState::Failed);
    }

    #[test]
    fn exhausted_budget_returns_last_error() {
        let calls = AtomicU32::new(0);
        let mut retrier = Retrier::new(policy().max_retries(2));
        let result: Result<(), _> = retrier.run(
            |_| {},
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::connection_lost(format!("attempt {n}")))
            },
        );
        assert_eq!(result.unwrap_err().message, "attempt 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn api_errors_retry_only_on_connectivity() {
        assert!(ApiError::Transport(TransportError::timed_out("t")).is_retryable());
        assert!(!ApiError::Transport(TransportError::other("x")).is_retryable());
        assert!(!ApiError::InvalidResponse("garbage".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn async_run_uses_injected_sleep() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let delays = Mutex::new(Vec::new());
        let mut retrier = Retrier::new(policy());

        let result = retrier
            .run_async_with(
                |delay| {
                    delays.lock().unwrap().push(delay);
                    async {}
                },
                move || async move {
                    match calls.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(TransportError::connection_lost("reset")),
                        _ => Ok(7),
                    }
                },
            )
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(*delays.lock().unwrap(), vec![Duration::from_millis(20)]);
    }

    #[tokio::test]
    async fn retry_async_with_zero_delay() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_async(RetryPolicy::new().base_delay(Duration::ZERO), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(TransportError::not_connected("offline"))
            } else {
                Ok(())
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
