//! Shared test utilities for tfaws
//!
//! This crate provides common test helpers that can be used across
//! multiple test modules without circular dependencies.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and test resource naming
//! - [`fakes`]: Scripted operations, concurrency probes and a fake change-token service
//! - [`logging`]: Tracing output captured by the test harness

pub mod aws;
pub mod fakes;
pub mod logging;

// Re-export commonly used items
pub use aws::{TEST_RESOURCE_PREFIX, get_test_region, is_test_resource, test_run_id};
pub use fakes::{ConcurrencyProbe, FakeTokenServer, ProbeGuard, ScriptedOperation};
pub use logging::init_tracing;
