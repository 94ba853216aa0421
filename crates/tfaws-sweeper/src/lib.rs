//! tfaws-sweeper - Concurrency and retry support for AWS resource sweepers
//!
//! This crate provides the machinery resource adapters use to run mutating
//! AWS calls safely and to bulk-delete leftover test resources.
//!
//! ## Modules
//!
//! - [`keyed_mutex`]: Per-key mutual exclusion with lazily created locks
//! - [`wait`]: Deadline-bounded retry loop with jittered initial delay
//! - [`token`]: Change-token serialized operations (WAF, WAF Regional)
//! - [`sweep`]: Parallel deletion with aggregated failures
//! - [`aws`]: SDK configuration, per-region clients and SDK error mapping
//! - [`config`]: Sweeper configuration from the environment

pub mod aws;
pub mod config;
pub mod error;
pub mod keyed_mutex;
pub mod sweep;
pub mod token;
pub mod wait;

pub use config::{AssumeRoleConfig, SweeperConfig};
pub use error::{ConfigError, RetryError};
pub use keyed_mutex::{KeyedMutex, KeyedMutexGuard};
pub use sweep::{AggregateError, SweepReport, SweepUnit, Sweeper, UnitError};
pub use token::ChangeTokenRetryer;
pub use wait::{RetryOutcome, RetryPolicy, retry};
