//! Typed errors for retry loops and sweeper configuration

use std::time::Duration;
use thiserror::Error;

/// Terminal failure of a retry loop
#[derive(Debug, Error)]
pub enum RetryError {
    /// The operation failed with a non-retryable error
    #[error(transparent)]
    Operation(anyhow::Error),

    /// The deadline passed and the final attempt still failed with a
    /// retryable error
    #[error(
        "timeout while waiting for {name} after {timeout:?} ({attempts} attempts){}",
        last_error_suffix(.last_error)
    )]
    Timeout {
        name: String,
        timeout: Duration,
        attempts: u32,
        last_error: Option<anyhow::Error>,
    },

    /// The caller's cancellation token fired
    #[error("wait for {name} cancelled after {attempts} attempts")]
    Cancelled { name: String, attempts: u32 },
}

fn last_error_suffix(last_error: &Option<anyhow::Error>) -> String {
    match last_error {
        Some(e) => format!(": last error: {e:#}"),
        None => String::new(),
    }
}

impl RetryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RetryError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// The underlying operation error, if any
    pub fn source_error(&self) -> Option<&anyhow::Error> {
        match self {
            RetryError::Operation(e) => Some(e),
            RetryError::Timeout { last_error, .. } => last_error.as_ref(),
            RetryError::Cancelled { .. } => None,
        }
    }

    /// Unwrap into the underlying operation error, keeping the timeout or
    /// cancellation message when there is none
    pub fn into_anyhow(self) -> anyhow::Error {
        match self {
            RetryError::Operation(e) => e,
            other => anyhow::Error::new(other),
        }
    }
}

/// Sweeper configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// None of the accepted credential sources is configured
    #[error("one of {} must be set: {purpose}", .names.join(", "))]
    MissingCredentials {
        names: Vec<&'static str>,
        purpose: &'static str,
    },

    /// Static access key without its secret
    #[error("{name} must be set: {purpose}")]
    MissingSecretKey {
        name: &'static str,
        purpose: String,
    },

    /// Assume-role duration is not a whole number of seconds
    #[error("environment variable {name}: invalid duration '{value}': {source}")]
    InvalidDuration {
        name: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_includes_last_error() {
        let err = RetryError::Timeout {
            name: "sweep sg-123".to_string(),
            timeout: Duration::from_secs(1),
            attempts: 4,
            last_error: Some(anyhow::anyhow!("Throttling: Rate exceeded")),
        };
        assert_eq!(
            err.to_string(),
            "timeout while waiting for sweep sg-123 after 1s (4 attempts): last error: Throttling: Rate exceeded"
        );
        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn operation_error_is_transparent() {
        let err = RetryError::Operation(anyhow::anyhow!("ValidationException: bad name"));
        assert_eq!(err.to_string(), "ValidationException: bad name");
        assert!(err.source_error().is_some());
        assert_eq!(err.into_anyhow().to_string(), "ValidationException: bad name");
    }

    #[test]
    fn cancelled_has_no_source_error() {
        let err = RetryError::Cancelled {
            name: "token".to_string(),
            attempts: 2,
        };
        assert!(err.source_error().is_none());
        assert!(err.into_anyhow().to_string().contains("cancelled"));
    }

    #[test]
    fn missing_credentials_lists_names() {
        let err = ConfigError::MissingCredentials {
            names: vec!["AWS_PROFILE", "AWS_ACCESS_KEY_ID"],
            purpose: "credentials for running sweepers",
        };
        assert_eq!(
            err.to_string(),
            "one of AWS_PROFILE, AWS_ACCESS_KEY_ID must be set: credentials for running sweepers"
        );
    }
}
