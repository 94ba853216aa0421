//! Structured error classification
//!
//! The retry core never inspects transport errors itself. Callers inject an
//! [`ErrorClassifier`] that maps an error onto a closed set of classes and
//! reasons, and each component decides what to do with that answer.

use std::fmt;

/// What the caller should do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Transient; try again within the retry budget
    Retryable,
    /// Permanent; surface immediately
    NonRetryable,
    /// Expected in some partitions or accounts; treat as success-with-skip
    Skippable,
}

/// Why an error was classified the way it was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    /// API rate limit hit
    Throttling,
    /// Change token was consumed by another caller before use
    StaleToken,
    /// Resource does not exist (already deleted)
    NotFound,
    /// Caller lacks permission
    AccessDenied,
    /// Endpoint or operation not available in this partition/region
    Unsupported,
    /// Anything the classifier does not recognize
    Other,
}

impl ErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorReason::Throttling => "throttling",
            ErrorReason::StaleToken => "stale_token",
            ErrorReason::NotFound => "not_found",
            ErrorReason::AccessDenied => "access_denied",
            ErrorReason::Unsupported => "unsupported",
            ErrorReason::Other => "other",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a single error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Classification {
    pub class: ErrorClass,
    pub reason: ErrorReason,
}

impl Classification {
    pub const fn retryable(reason: ErrorReason) -> Self {
        Self {
            class: ErrorClass::Retryable,
            reason,
        }
    }

    pub const fn non_retryable(reason: ErrorReason) -> Self {
        Self {
            class: ErrorClass::NonRetryable,
            reason,
        }
    }

    pub const fn skippable(reason: ErrorReason) -> Self {
        Self {
            class: ErrorClass::Skippable,
            reason,
        }
    }

    /// Fallback for errors nobody recognizes
    pub const fn unknown() -> Self {
        Self::non_retryable(ErrorReason::Other)
    }

    pub fn is_retryable(&self) -> bool {
        self.class == ErrorClass::Retryable
    }

    pub fn is_skippable(&self) -> bool {
        self.class == ErrorClass::Skippable
    }
}

/// Capability that maps an operation error to a [`Classification`].
///
/// Implemented for plain closures so tests and small callers can pass
/// `|err: &anyhow::Error| ...` directly.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &anyhow::Error) -> Classification;
}

impl<F> ErrorClassifier for F
where
    F: Fn(&anyhow::Error) -> Classification + Send + Sync,
{
    fn classify(&self, error: &anyhow::Error) -> Classification {
        self(error)
    }
}
