//! Errors collected from independently running sweep units

use crate::error::RetryError;
use std::fmt::Write;
use thiserror::Error;

/// Terminal failure of one unit
#[derive(Debug, Error)]
#[error("{id}: {error}")]
pub struct UnitError {
    pub id: String,
    #[source]
    pub error: RetryError,
}

/// Zero or more unit failures.
///
/// An empty aggregate is the successful outcome; use [`into_result`] to turn
/// it into a `Result`.
///
/// [`into_result`]: AggregateError::into_result
#[derive(Debug, Default, Error)]
#[error("{}", format_errors(.errors))]
pub struct AggregateError {
    errors: Vec<UnitError>,
}

fn format_errors(errors: &[UnitError]) -> String {
    let mut out = match errors.len() {
        0 => return "no errors occurred".to_string(),
        1 => "1 error occurred:".to_string(),
        n => format!("{n} errors occurred:"),
    };
    for e in errors {
        let _ = write!(out, "\n\t* {e}");
    }
    out
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: UnitError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[UnitError] {
        &self.errors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UnitError> {
        self.errors.iter()
    }

    /// Ids of the failed units, in the order they were recorded
    pub fn ids(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.id.as_str()).collect()
    }

    /// `Ok(())` when nothing failed, otherwise the aggregate itself
    pub fn into_result(self) -> Result<(), AggregateError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Extend<UnitError> for AggregateError {
    fn extend<I: IntoIterator<Item = UnitError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl IntoIterator for AggregateError {
    type Item = UnitError;
    type IntoIter = std::vec::IntoIter<UnitError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a AggregateError {
    type Item = &'a UnitError;
    type IntoIter = std::slice::Iter<'a, UnitError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
