//! tfaws-common - Shared types for the sweeper and its callers
//!
//! This crate holds the pieces resource adapters need without pulling in the
//! AWS SDK or the async runtime.
//!
//! ## Modules
//!
//! - [`api_error`]: Transport-neutral API error with code-based classification
//! - [`classify`]: Error classes, reasons and the classifier capability
//! - [`defaults`]: Default timeouts and retry limits

pub mod api_error;
pub mod classify;
pub mod defaults;

pub use api_error::{ApiError, ApiErrorClassifier, classify_api_error};
pub use classify::{Classification, ErrorClass, ErrorClassifier, ErrorReason};
