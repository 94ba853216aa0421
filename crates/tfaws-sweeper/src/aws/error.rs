//! SDK error mapping
//!
//! SDK errors are converted into [`ApiError`] at the call site, so the
//! classifier only has to recognize one error type no matter which service
//! client produced it.

use aws_sdk_wafregional::error::{ProvideErrorMetadata, SdkError};
use std::error::Error as StdError;
use std::fmt::{Debug, Display};
use tfaws_common::ApiError;

/// Code given to requests that never got a response, matching the skip rule
/// for unreachable endpoints
pub const REQUEST_ERROR_CODE: &str = "RequestError";

/// Build an [`ApiError`] from anything carrying AWS error metadata.
pub fn api_error<E>(err: &E) -> ApiError
where
    E: ProvideErrorMetadata + Display,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());
    match err.code() {
        Some(code) => ApiError::new(code, message),
        None => ApiError::uncoded(message),
    }
}

/// Build an [`ApiError`] from an SDK call failure.
///
/// Dispatch failures and client-side timeouts carry no service metadata and
/// are reported as [`REQUEST_ERROR_CODE`].
pub fn sdk_api_error<E, R>(err: &SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: Debug,
{
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            let detail = err
                .source()
                .map(|source| source.to_string())
                .unwrap_or_else(|| err.to_string());
            ApiError::new(REQUEST_ERROR_CODE, format!("send request failed: {detail}"))
        }
        _ => api_error(err),
    }
}

/// Extension for SDK results: map the error to [`ApiError`] and add context.
///
/// # Example
/// ```ignore
/// let out = client
///     .get_change_token()
///     .send()
///     .await
///     .api_context("Failed to get change token")?;
/// ```
pub trait SdkResultExt<T> {
    fn api_context(self, context: &'static str) -> anyhow::Result<T>;
}

impl<T, E, R> SdkResultExt<T> for Result<T, SdkError<E, R>>
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
    R: Debug,
{
    fn api_context(self, context: &'static str) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::Error::new(sdk_api_error(&e)).context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_wafregional::error::ErrorMetadata;
    use aws_sdk_wafregional::operation::get_change_token::GetChangeTokenError;
    use tfaws_common::{ApiErrorClassifier, ErrorClassifier, ErrorReason};

    fn service_error(code: &str, message: &str) -> GetChangeTokenError {
        GetChangeTokenError::generic(ErrorMetadata::builder().code(code).message(message).build())
    }

    #[test]
    fn service_error_keeps_code_and_message() {
        let err = api_error(&service_error("WAFStaleDataException", "token already used"));
        assert_eq!(err.code(), Some("WAFStaleDataException"));
        assert_eq!(err.to_string(), "WAFStaleDataException: token already used");
        assert_eq!(err.classify().reason, ErrorReason::StaleToken);
    }

    #[test]
    fn timeout_maps_to_request_error() {
        let err = SdkError::<GetChangeTokenError, ()>::timeout_error("operation timed out");
        let api = sdk_api_error(&err);
        assert_eq!(api.code(), Some(REQUEST_ERROR_CODE));
        assert!(api.to_string().contains("send request failed"));
    }

    #[test]
    fn api_context_is_classifiable() {
        let result: Result<(), _> =
            Err(SdkError::<GetChangeTokenError, ()>::timeout_error("operation timed out"));
        let err = result.api_context("Failed to get change token").unwrap_err();

        assert_eq!(err.to_string(), "Failed to get change token");
        assert!(err.downcast_ref::<ApiError>().is_some());
        assert_eq!(ApiErrorClassifier.classify(&err).reason, ErrorReason::Unsupported);
    }
}
