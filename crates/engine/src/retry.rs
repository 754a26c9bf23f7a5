//! Retry, timeout and cancellation handling for store calls.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tessera_core::config::{RetryConfig, TimeoutConfig};
use tessera_storage::{StorageError, StorageResult};
use tokio_util::sync::CancellationToken;

/// Bounded exponential backoff plus a per-call timeout.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    operation_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(retry: &RetryConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            max_attempts: retry.max_attempts.max(1),
            base_delay: retry.base_delay(),
            max_delay: retry.max_delay(),
            operation_timeout: timeouts.operation_timeout(),
        }
    }

    /// Total attempts per call, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Delay after the `attempt`-th failure: `base * 2^(attempt-1)`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Run a point call, retrying retryable failures.
    ///
    /// Cancellation interrupts both the backoff and an in-flight call.
    pub async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        cancel: Option<&CancellationToken>,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            check_cancelled(cancel)?;

            let err = match interruptible(cancel, self.timed(operation, call())).await? {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => err,
                Err(err) => return Err(err.into()),
            };
            self.backoff(operation, attempt, &err, cancel).await?;
        }
    }

    /// Run a point call that must not be abandoned once issued.
    ///
    /// Cancellation is only observed before each attempt, so a cancelled
    /// caller never starts a new attempt but never leaves one half-done.
    pub async fn call_guarded<T, F, Fut>(
        &self,
        operation: &'static str,
        cancel: Option<&CancellationToken>,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            check_cancelled(cancel)?;

            let err = match self.timed(operation, call()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => err,
                Err(err) => return Err(err.into()),
            };
            self.backoff(operation, attempt, &err, None).await?;
        }
    }

    /// Run a batch call until every entry is processed.
    ///
    /// `call` receives the pending entries and returns its partial result
    /// plus whatever the store left unprocessed; those are resubmitted after
    /// a backoff. Returns every partial result in call order.
    pub async fn call_partial<I, R, F, Fut>(
        &self,
        operation: &'static str,
        cancel: Option<&CancellationToken>,
        entries: Vec<I>,
        mut call: F,
    ) -> Result<Vec<R>>
    where
        I: Clone,
        F: FnMut(Vec<I>) -> Fut,
        Fut: Future<Output = StorageResult<(R, Vec<I>)>>,
    {
        let mut pending = entries;
        let mut results = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            check_cancelled(cancel)?;

            let outcome = interruptible(cancel, self.timed(operation, call(pending.clone()))).await?;
            let err = match outcome {
                Ok((result, unprocessed)) => {
                    results.push(result);
                    if unprocessed.is_empty() {
                        return Ok(results);
                    }
                    let err = StorageError::Throttled(format!(
                        "{} of {} entries unprocessed",
                        unprocessed.len(),
                        pending.len()
                    ));
                    pending = unprocessed;
                    err
                }
                Err(err) if err.is_retryable() => err,
                Err(err) => return Err(err.into()),
            };
            self.backoff(operation, attempt, &err, cancel).await?;
        }
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StorageResult<T>>,
    ) -> StorageResult<T> {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(format!(
                "{operation} exceeded {:?}",
                self.operation_timeout
            ))),
        }
    }

    /// Sleep before the next attempt, or give up once the budget is spent.
    async fn backoff(
        &self,
        operation: &'static str,
        attempt: u32,
        err: &StorageError,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        if attempt >= self.max_attempts {
            tracing::warn!(operation, attempts = attempt, error = %err, "retry budget exhausted");
            return Err(Error::StoreUnavailable {
                operation,
                attempts: attempt,
                last_error: err.to_string(),
            });
        }

        let delay = self.delay(attempt);
        tracing::warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "store call failed, retrying"
        );
        interruptible(cancel, tokio::time::sleep(delay)).await
    }
}

pub(crate) fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

/// Await `fut` unless `cancel` fires first.
async fn interruptible<T>(
    cancel: Option<&CancellationToken>,
    fut: impl Future<Output = T>,
) -> Result<T> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            value = fut => Ok(value),
        },
        None => Ok(fut.await),
    }
}
