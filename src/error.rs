// ⚠️ Error Types - Store, row and reconciliation failures
//
// NotFound is deliberately absent from StoreError: a missing company is a
// normal Resolution outcome, not a failure.

use std::path::PathBuf;
use thiserror::Error;

/// A single dataset row could not be turned into a Record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("column '{column}': cannot parse '{value}' as {expected}")]
    InvalidNumber {
        column: String,
        value: String,
        expected: &'static str,
    },
}

/// Entity Store failures.
///
/// Every load variant leaves the store unloaded.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Lookup attempted before a successful load.
    #[error("entity store is not loaded")]
    Unloaded,

    #[error("no dataset source configured")]
    NoSource,

    #[error("cannot read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {label}: {source}")]
    Csv {
        label: String,
        #[source]
        source: csv::Error,
    },

    #[error("{label}, line {line}: {source}")]
    InvalidRow {
        label: String,
        line: u64,
        #[source]
        source: RecordError,
    },
}

impl StoreError {
    /// True for every error produced by a failed load (as opposed to a
    /// lookup against an unloaded store).
    pub fn is_load_failure(&self) -> bool {
        !matches!(self, StoreError::Unloaded)
    }
}

/// Failures of the resolve-then-compare flow.
///
/// Callers translate these into protocol responses (400 / 404 / 503).
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Extraction failed. Extracted data is empty.")]
    EmptyExtraction,

    #[error("{0} not found in extracted data.")]
    MissingIdentity(String),

    #[error("{field} must be text, got {value}")]
    InvalidIdentity { field: String, value: String },

    #[error("No data found for company {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
