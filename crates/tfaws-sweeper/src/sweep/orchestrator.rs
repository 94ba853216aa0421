//! Parallel sweeping of leftover resources

use super::aggregate::{AggregateError, UnitError};
use super::unit::SweepUnit;
use crate::error::RetryError;
use crate::wait::{RetryOutcome, RetryPolicy, retry};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tfaws_common::defaults::SWEEP_THROTTLING_RETRY_TIMEOUT;
use tfaws_common::{ApiErrorClassifier, ErrorClassifier, ErrorReason};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of sweeping a batch of units
#[derive(Debug, Default)]
pub struct SweepReport {
    pub total: usize,
    pub deleted: usize,
    /// Units whose failure the classifier marked as skippable
    pub skipped: usize,
    pub errors: AggregateError,
}

impl SweepReport {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }
}

/// Outcome of one unit, before aggregation
enum UnitOutcome {
    Deleted,
    Skipped,
    Failed(RetryError),
}

/// Deletes sweep units concurrently, retrying throttled deletes.
///
/// Every unit runs in its own task with its own retry loop. A failing unit
/// never cancels or delays its siblings; all failures are collected into one
/// [`AggregateError`].
#[derive(Clone)]
pub struct Sweeper {
    policy: RetryPolicy,
    classifier: Arc<dyn ErrorClassifier>,
    skip_skippable: bool,
    cancel: Option<CancellationToken>,
}

impl Default for Sweeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Sweeper {
    pub fn new() -> Self {
        Self {
            policy: Self::default_policy(),
            classifier: Arc::new(ApiErrorClassifier),
            skip_skippable: true,
            cancel: None,
        }
    }

    /// No initial delay, exponential polling, 10 minute deadline
    pub const fn default_policy() -> RetryPolicy {
        RetryPolicy::with_timeout(SWEEP_THROTTLING_RETRY_TIMEOUT)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_classifier(mut self, classifier: impl ErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Whether failures classified as skippable count as skipped (the
    /// default) or as errors
    pub fn skip_skippable(mut self, skip: bool) -> Self {
        self.skip_skippable = skip;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Sweep every unit and return the collected failures.
    pub async fn run_all(&self, units: Vec<SweepUnit>) -> AggregateError {
        self.run_all_with_report(units).await.errors
    }

    /// Sweep every unit and return per-outcome counts with the failures.
    ///
    /// Units run on tasks owned by this future. Dropping it before it
    /// completes aborts every unit still in flight.
    pub async fn run_all_with_report(&self, units: Vec<SweepUnit>) -> SweepReport {
        let mut report = SweepReport {
            total: units.len(),
            ..Default::default()
        };

        if units.is_empty() {
            debug!("No resources to sweep");
            return report;
        }

        info!(count = units.len(), "Sweeping resources");

        let ids: Vec<String> = units.iter().map(|unit| unit.id().to_string()).collect();
        let mut tasks = JoinSet::new();
        for (index, unit) in units.into_iter().enumerate() {
            let sweeper = self.clone();
            let id = ids[index].clone();
            tasks.spawn(async move {
                let outcome = AssertUnwindSafe(sweeper.sweep_one(unit))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let message = panic_message(&*panic);
                        warn!(resource = %id, panic = %message, "Sweep task panicked");
                        UnitOutcome::Failed(RetryError::Operation(anyhow::anyhow!(
                            "sweep task panicked: {message}"
                        )))
                    });
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<UnitOutcome>> = ids.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => warn!(error = %e, "Sweep task did not complete"),
            }
        }

        // Aggregate in input order regardless of completion order
        for (id, outcome) in ids.into_iter().zip(outcomes) {
            match outcome {
                Some(UnitOutcome::Deleted) => report.deleted += 1,
                Some(UnitOutcome::Skipped) => report.skipped += 1,
                Some(UnitOutcome::Failed(error)) => report.errors.push(UnitError { id, error }),
                None => report.errors.push(UnitError {
                    id,
                    error: RetryError::Operation(anyhow::anyhow!("sweep task did not complete")),
                }),
            }
        }

        info!(
            total = report.total,
            deleted = report.deleted,
            skipped = report.skipped,
            failed = report.failed(),
            "Sweep complete"
        );

        report
    }

    async fn sweep_one(&self, unit: SweepUnit) -> UnitOutcome {
        let name = format!("sweep {}", unit.id());
        let classifier = &self.classifier;
        let unit = &unit;

        let result = retry(self.policy, self.cancel.as_ref(), &name, move || async move {
            RetryOutcome::from_result(unit.delete().await, |e| {
                let throttled = classifier.classify(e).reason == ErrorReason::Throttling;
                if throttled {
                    info!(
                        resource = %unit.id(),
                        error = %e,
                        "Encountered throttling error while sweeping, retrying"
                    );
                }
                throttled
            })
        })
        .await;

        match result {
            Ok(()) => {
                debug!(resource = %unit.id(), "Swept");
                UnitOutcome::Deleted
            }
            Err(e) if self.skip_skippable && self.is_skippable(&e) => {
                warn!(resource = %unit.id(), error = %e, "Skipping resource");
                UnitOutcome::Skipped
            }
            Err(e) => {
                warn!(resource = %unit.id(), error = %e, "Sweep failed");
                UnitOutcome::Failed(e)
            }
        }
    }

    fn is_skippable(&self, error: &RetryError) -> bool {
        error
            .source_error()
            .is_some_and(|e| self.classifier.classify(e).is_skippable())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("policy", &self.policy)
            .field("skip_skippable", &self.skip_skippable)
            .finish_non_exhaustive()
    }
}
