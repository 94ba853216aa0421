//! AWS test utilities
//!
//! Region selection and naming for resources created by acceptance tests.
//! Sweepers only delete resources whose names carry [`TEST_RESOURCE_PREFIX`].

use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Name prefix shared by every resource a test run creates
pub const TEST_RESOURCE_PREFIX: &str = "tf-acc-test-";

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-west-2
///
/// # Example
///
/// ```
/// use tfaws_test_utils::aws::get_test_region;
///
/// let region = get_test_region();
/// assert!(!region.is_empty());
/// ```
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-west-2".to_string())
}

/// A resource name unique to this run: `tf-acc-test-{unix_ms}-{seq}`.
///
/// # Example
///
/// ```
/// use tfaws_test_utils::aws::{is_test_resource, test_run_id};
///
/// assert!(is_test_resource(&test_run_id()));
/// ```
pub fn test_run_id() -> String {
    static SEQ: AtomicU32 = AtomicU32::new(0);

    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{TEST_RESOURCE_PREFIX}{}-{seq}", Utc::now().timestamp_millis())
}

/// Whether a sweeper may delete the resource called `name`
pub fn is_test_resource(name: &str) -> bool {
    name.strip_prefix(TEST_RESOURCE_PREFIX)
        .is_some_and(|rest| !rest.is_empty())
}
