//! Bulk deletion of leftover test resources
//!
//! Resource sweepers discover leftovers, wrap each one in a [`SweepUnit`],
//! and hand the batch to a [`Sweeper`], which deletes them concurrently and
//! reports every failure through one [`AggregateError`].

pub mod aggregate;
pub mod orchestrator;
pub mod unit;

pub use aggregate::{AggregateError, UnitError};
pub use orchestrator::{SweepReport, Sweeper};
pub use unit::SweepUnit;
