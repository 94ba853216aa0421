//! Retry-until-condition waiting with a deadline and cancellation support.
//!
//! Provides the generic polling loop used by the sweeper and the change-token
//! retryer: an initial staggered delay, backoff between retryable failures,
//! and exactly one final un-retried attempt once the deadline has passed.

use crate::error::RetryError;
use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tfaws_common::defaults::{INITIAL_POLL_DELAY, MAX_POLL_DELAY};
use tfaws_common::ErrorClassifier;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Timing policy for a retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first attempt
    pub initial_delay: Duration,
    /// Upper bound of a uniformly random extra delay before the first attempt
    pub delay_jitter: Duration,
    /// Lower bound on every wait between attempts
    pub min_timeout: Duration,
    /// Fixed wait between attempts; zero means exponential backoff
    pub poll_interval: Duration,
    /// Overall deadline, measured from the start of the call
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Policy with only a deadline; waits grow exponentially from 100ms.
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            delay_jitter: Duration::ZERO,
            min_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            timeout,
        }
    }

    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub const fn delay_jitter(mut self, jitter: Duration) -> Self {
        self.delay_jitter = jitter;
        self
    }

    pub const fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Delay before the first attempt: `initial_delay` plus `U[0, jitter]`.
    fn start_delay(&self) -> Duration {
        if self.delay_jitter.is_zero() {
            return self.initial_delay;
        }
        let jitter = self.delay_jitter.mul_f64(rand::thread_rng().gen_range(0.0..=1.0));
        self.initial_delay.saturating_add(jitter)
    }

    /// Waits between attempts. Constant when a poll interval is set,
    /// otherwise doubling from 100ms up to 10s; never below `min_timeout`.
    fn delays(&self) -> impl Iterator<Item = Duration> {
        let min_timeout = self.min_timeout;
        let (backoff, fallback): (Box<dyn Iterator<Item = Duration> + Send>, Duration) =
            if self.poll_interval.is_zero() {
                let exponential = ExponentialBuilder::default()
                    .with_min_delay(INITIAL_POLL_DELAY)
                    .with_max_delay(MAX_POLL_DELAY)
                    .with_factor(2.0)
                    .with_max_times(usize::MAX)
                    .build();
                (Box::new(exponential), MAX_POLL_DELAY)
            } else {
                let constant = ConstantBuilder::default()
                    .with_delay(self.poll_interval)
                    .with_max_times(usize::MAX)
                    .build();
                (Box::new(constant), self.poll_interval)
            };

        backoff
            .chain(std::iter::repeat(fallback))
            .map(move |d| d.max(min_timeout))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(60))
    }
}

/// Result of a single attempt.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success(T),
    Retryable(anyhow::Error),
    NonRetryable(anyhow::Error),
}

impl<T> RetryOutcome<T> {
    /// Turn an operation result into an outcome, retrying only errors the
    /// predicate accepts.
    pub fn from_result<F>(result: anyhow::Result<T>, is_retryable: F) -> Self
    where
        F: FnOnce(&anyhow::Error) -> bool,
    {
        match result {
            Ok(v) => RetryOutcome::Success(v),
            Err(e) if is_retryable(&e) => RetryOutcome::Retryable(e),
            Err(e) => RetryOutcome::NonRetryable(e),
        }
    }

    /// Turn an operation result into an outcome using a classifier's
    /// retryable class.
    pub fn classify<C>(result: anyhow::Result<T>, classifier: &C) -> Self
    where
        C: ErrorClassifier + ?Sized,
    {
        Self::from_result(result, |e| classifier.classify(e).is_retryable())
    }
}

/// Stand-in deadline for timeouts too large to add to an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Sleep for `delay`, returning `false` if the token fired first.
async fn sleep_or_cancel(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = async {
            if let Some(token) = cancel {
                token.cancelled().await
            } else {
                std::future::pending::<()>().await
            }
        } => false,
    }
}

/// Retry an operation until it succeeds, fails permanently, or the policy's
/// deadline passes.
///
/// When the deadline passes while the operation is still failing with
/// retryable errors, one final attempt is made and its result is returned:
/// success as `Ok`, a non-retryable failure as [`RetryError::Operation`], and
/// a retryable one as [`RetryError::Timeout`] carrying that last error.
///
/// # Arguments
/// * `policy` - Timing policy
/// * `cancel` - Optional cancellation token, checked before every attempt and
///   during every sleep
/// * `name` - Name for logging and error messages
/// * `operation` - Async function producing a [`RetryOutcome`]
///
/// # Example
/// ```ignore
/// let policy = RetryPolicy::with_timeout(Duration::from_secs(30));
/// let bucket = retry(policy, Some(&cancel), "bucket deletion", || async {
///     RetryOutcome::classify(delete_bucket().await, &ApiErrorClassifier)
/// })
/// .await?;
/// ```
pub async fn retry<T, F, Fut>(
    policy: RetryPolicy,
    cancel: Option<&CancellationToken>,
    name: &str,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RetryOutcome<T>>,
{
    let start = Instant::now();
    let deadline = start
        .checked_add(policy.timeout)
        .unwrap_or_else(|| start + FAR_FUTURE);
    let mut attempts = 0u32;
    let mut delays = policy.delays();

    let cancelled = |attempts| RetryError::Cancelled {
        name: name.to_string(),
        attempts,
    };

    let start_delay = policy
        .start_delay()
        .min(deadline.saturating_duration_since(start));
    if !start_delay.is_zero() {
        debug!(resource = %name, delay_ms = start_delay.as_millis(), "Delaying first attempt");
        if !sleep_or_cancel(start_delay, cancel).await {
            return Err(cancelled(attempts));
        }
    }

    loop {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(cancelled(attempts));
        }

        if Instant::now() >= deadline {
            break;
        }

        attempts += 1;
        match operation().await {
            RetryOutcome::Success(value) => {
                debug!(resource = %name, attempts, "Operation succeeded");
                return Ok(value);
            }
            RetryOutcome::NonRetryable(e) => {
                debug!(resource = %name, attempts, error = %e, "Operation failed permanently");
                return Err(RetryError::Operation(e));
            }
            RetryOutcome::Retryable(e) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                let delay = delays.next().unwrap_or(MAX_POLL_DELAY).min(remaining);
                debug!(
                    resource = %name,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "Retryable failure, retrying"
                );
                if !sleep_or_cancel(delay, cancel).await {
                    return Err(cancelled(attempts));
                }
            }
        }
    }

    attempts += 1;
    warn!(
        resource = %name,
        timeout = ?policy.timeout,
        attempts,
        "Deadline passed, making final attempt"
    );
    match operation().await {
        RetryOutcome::Success(value) => Ok(value),
        RetryOutcome::NonRetryable(e) => Err(RetryError::Operation(e)),
        RetryOutcome::Retryable(e) => Err(RetryError::Timeout {
            name: name.to_string(),
            timeout: policy.timeout,
            attempts,
            last_error: Some(e),
        }),
    }
}
