//! API error codes and their classification
//!
//! Resource adapters convert SDK failures into [`ApiError`] at the call site
//! (see `tfaws_sweeper::aws::error`) so classification works on the error
//! code rather than on formatted messages.

use crate::classify::{Classification, ErrorClassifier, ErrorReason};
use thiserror::Error;

/// An API failure reduced to its service error code and message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .code.as_deref().unwrap_or("UnknownError"))]
pub struct ApiError {
    pub code: Option<String>,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Error without a service code (e.g. a transport failure)
    pub fn uncoded(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn classify(&self) -> Classification {
        classify_api_error(self.code(), Some(self.message.as_str()))
    }
}

/// Error codes for rate limiting
const THROTTLING_CODES: &[&str] = &[
    "ThrottlingException",
    "Throttling",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// Error codes for a change token that was superseded before use
const STALE_TOKEN_CODES: &[&str] = &["WAFStaleDataException", "StaleDataException"];

/// Error codes meaning the resource is already gone
const NOT_FOUND_CODES: &[&str] = &[
    "WAFNonexistentItemException",
    "ResourceNotFoundException",
    "InvalidInstanceID.NotFound",
    "InvalidGroup.NotFound",
    "NoSuchEntity",
    "NoSuchBucket",
    "NotFoundException",
];

/// Errors that mean a whole sweeper should be skipped in this region or
/// partition. An empty message fragment matches any message.
const SKIP_SWEEP_RULES: &[(&str, &str)] = &[
    // Missing API endpoints
    ("RequestError", "send request failed"),
    ("UnsupportedOperation", ""),
    ("InvalidParameterValue", "not permitted in this API version for your account"),
    ("InvalidParameterValue", "Access Denied to API Version"),
    // GovCloud answers many unsupported calls with a bare AccessDeniedException
    ("AccessDeniedException", ""),
    ("BadRequestException", "not supported"),
    ("InvalidAction", "is not valid"),
    ("InvalidAction", "Unavailable Operation"),
    ("InvalidKeySigningKeyStatus", "cannot be deleted because"),
    ("KeySigningKeyInParentDSRecord", "Due to DNS lookup failure"),
];

/// Check whether an error means the sweeper for this API should be skipped
/// entirely (missing endpoint, unsupported call, partition restriction).
pub fn skip_sweep_error(code: Option<&str>, message: Option<&str>) -> bool {
    let Some(code) = code else {
        return false;
    };
    let message = message.unwrap_or_default();

    SKIP_SWEEP_RULES
        .iter()
        .any(|(c, fragment)| *c == code && (fragment.is_empty() || message.contains(fragment)))
}

/// Check whether an error means a single resource should be skipped, e.g.
/// one managed centrally that the sweeper role cannot touch.
pub fn skip_sweep_resource_error(code: Option<&str>) -> bool {
    code.is_some_and(|c| c.contains("AccessDenied"))
}

/// Classify an API error using its code, with the message only consulted
/// for codes whose meaning depends on it.
pub fn classify_api_error(code: Option<&str>, message: Option<&str>) -> Classification {
    match code {
        Some(c) if THROTTLING_CODES.contains(&c) => {
            Classification::retryable(ErrorReason::Throttling)
        }
        Some(c) if STALE_TOKEN_CODES.contains(&c) => {
            Classification::retryable(ErrorReason::StaleToken)
        }
        Some(c) if skip_sweep_resource_error(Some(c)) => {
            Classification::skippable(ErrorReason::AccessDenied)
        }
        _ if skip_sweep_error(code, message) => Classification::skippable(ErrorReason::Unsupported),
        Some(c) if NOT_FOUND_CODES.contains(&c) || c.ends_with(".NotFound") => {
            Classification::non_retryable(ErrorReason::NotFound)
        }
        _ => Classification::unknown(),
    }
}

/// Every code worth recovering from a formatted error, longest first so
/// that e.g. `ThrottlingException` wins over `Throttling`.
const ALL_KNOWN_CODES: &[&str] = &[
    "InvalidKeySigningKeyStatus",
    "KeySigningKeyInParentDSRecord",
    "WAFNonexistentItemException",
    "InvalidInstanceID.NotFound",
    "ResourceNotFoundException",
    "TooManyRequestsException",
    "WAFStaleDataException",
    "InvalidParameterValue",
    "AccessDeniedException",
    "InvalidGroup.NotFound",
    "RequestLimitExceeded",
    "UnsupportedOperation",
    "BadRequestException",
    "ThrottlingException",
    "StaleDataException",
    "NotFoundException",
    "NoSuchEntity",
    "NoSuchBucket",
    "RequestError",
    "InvalidAction",
    "AccessDenied",
    "Throttling",
];

/// Extract an error code from a Debug/Display representation
fn extract_error_code(text: &str) -> Option<String> {
    if let Some(start) = text.find("code: Some(\"") {
        let rest = &text[start + 12..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    ALL_KNOWN_CODES
        .iter()
        .find(|code| text.contains(*code))
        .map(|code| (*code).to_string())
}

/// [`ErrorClassifier`] for errors produced by resource adapters.
///
/// Walks the `anyhow` chain looking for an [`ApiError`]. Errors that never
/// went through `ApiError` fall back to recovering a known code from their
/// Debug representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiErrorClassifier;

impl ErrorClassifier for ApiErrorClassifier {
    fn classify(&self, error: &anyhow::Error) -> Classification {
        if let Some(api) = error.chain().find_map(|c| c.downcast_ref::<ApiError>()) {
            return api.classify();
        }

        let debug_str = format!("{error:?}");
        match extract_error_code(&debug_str) {
            Some(code) => classify_api_error(Some(code.as_str()), Some(debug_str.as_str())),
            None => Classification::unknown(),
        }
    }
}
