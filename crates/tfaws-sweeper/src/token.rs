//! Change-token serialized operations
//!
//! Some APIs (WAF, WAF Regional) require every mutating call to carry a
//! freshly issued change token, and a token consumed by a concurrent call
//! turns the next one stale. Calls are serialized per key through a
//! [`KeyedMutex`]; staleness caused by other processes is absorbed by a retry
//! loop that fetches a new token on every attempt.

use crate::error::RetryError;
use crate::keyed_mutex::KeyedMutex;
use crate::wait::{RetryOutcome, RetryPolicy, retry};
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use tfaws_common::defaults::CHANGE_TOKEN_RETRY_TIMEOUT;
use tfaws_common::{ApiErrorClassifier, ErrorClassifier, ErrorReason};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs token-consuming operations one at a time per key.
#[derive(Clone)]
pub struct ChangeTokenRetryer {
    locks: KeyedMutex,
    policy: RetryPolicy,
    classifier: Arc<dyn ErrorClassifier>,
    cancel: Option<CancellationToken>,
}

impl ChangeTokenRetryer {
    /// Create a retryer that serializes on `locks`.
    ///
    /// Share the same [`KeyedMutex`] between every retryer that talks to the
    /// same token-issuing API.
    pub fn new(locks: KeyedMutex) -> Self {
        Self {
            locks,
            policy: Self::default_policy(),
            classifier: Arc::new(ApiErrorClassifier),
            cancel: None,
        }
    }

    /// 15 minute deadline, exponential polling
    pub const fn default_policy() -> RetryPolicy {
        RetryPolicy::with_timeout(CHANGE_TOKEN_RETRY_TIMEOUT)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_classifier(mut self, classifier: impl ErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn locks(&self) -> &KeyedMutex {
        &self.locks
    }

    /// Run `operation` with a fresh token while holding the lock for `key`.
    ///
    /// A token fetch failure is not retried. An operation failure is retried
    /// only when the classifier reports [`ErrorReason::StaleToken`]; a new
    /// token is fetched for each attempt. The lock is released on every exit
    /// path. Cancellation also interrupts the wait for the lock.
    pub async fn run_with_token<T, Tok, FetchFn, FetchFut, OpFn, OpFut>(
        &self,
        key: &str,
        fetch_token: FetchFn,
        operation: OpFn,
    ) -> Result<T, RetryError>
    where
        FetchFn: Fn() -> FetchFut,
        FetchFut: Future<Output = anyhow::Result<Tok>>,
        OpFn: Fn(Tok) -> OpFut,
        OpFut: Future<Output = anyhow::Result<T>>,
    {
        let name = format!("change token operation ({key})");

        let guard = match &self.cancel {
            Some(cancel) => tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(key = %key, "Cancelled while waiting for change token lock");
                    return Err(RetryError::Cancelled { name, attempts: 0 });
                }
                guard = self.locks.lock(key) => guard,
            },
            None => self.locks.lock(key).await,
        };
        debug!(key = %guard.key(), "Holding change token lock");

        let fetch_token = &fetch_token;
        let operation = &operation;
        let classifier = &self.classifier;

        let result = retry(self.policy, self.cancel.as_ref(), &name, move || async move {
            let token = match fetch_token().await.context("failed to acquire change token") {
                Ok(token) => token,
                Err(e) => return RetryOutcome::NonRetryable(e),
            };

            RetryOutcome::from_result(operation(token).await, |e| {
                let stale = classifier.classify(e).reason == ErrorReason::StaleToken;
                if stale {
                    info!(key = %key, error = %e, "Change token went stale, retrying with a new token");
                }
                stale
            })
        })
        .await;

        guard.unlock();
        result
    }
}

impl std::fmt::Debug for ChangeTokenRetryer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTokenRetryer")
            .field("locks", &self.locks)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
