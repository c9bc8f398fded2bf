use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::scoring::Criterion;

/// Bad input: a score, a date, or an import header.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("score for '{criterion}' is not numeric: {value}")]
    NotNumeric { criterion: Criterion, value: String },

    #[error("score for '{criterion}' is out of range 1-5: {value}")]
    OutOfRange { criterion: Criterion, value: f64 },

    #[error("invalid {field} (expected YYYY-MM-DD): {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("invalid {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Any failure touching the database or the CSV files.
///
/// Driver errors are flattened to text here so callers only ever see this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {cause}")]
pub struct StorageError {
    pub operation: &'static str,
    pub cause: String,
}

impl StorageError {
    pub fn new(operation: &'static str, cause: impl Into<String>) -> Self {
        Self {
            operation,
            cause: cause.into(),
        }
    }

    /// Adapter for `map_err`: `.map_err(StorageError::wrap("insert"))`.
    pub fn wrap<E: fmt::Display>(operation: &'static str) -> impl Fn(E) -> StorageError {
        move |e| StorageError::new(operation, e.to_string())
    }
}

/// Fatal failures of a bulk import run. Per-row problems are not errors.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
