//! Error types for the report pipeline.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that abort a report run.
///
/// Every variant is raised at the stage boundary where the precondition is
/// violated. Missing cells in derived columns are `None`, not errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Structurally broken source table
    #[error("Malformed input in {source_name}: {reason}")]
    MalformedInput {
        /// Path or label of the offending table
        source_name: String,
        /// What was wrong with it
        reason: String,
    },

    /// Region filter matched no rows
    #[error("Region not found in {source_name}: {region:?}")]
    RegionNotFound {
        /// Requested parent-region name
        region: String,
        /// Table that was searched
        source_name: String,
    },

    /// The two tables disagree on date coverage
    #[error("Date columns do not line up: {reason}")]
    ColumnMismatch {
        /// First disagreement found
        reason: String,
    },

    /// A date header could not be parsed
    #[error("Unparseable date label: {label:?}")]
    DateParse {
        /// The raw header label
        label: String,
    },

    /// Regression is undefined for the given series
    #[error("Insufficient data for regression: {reason}")]
    InsufficientData {
        /// Why the fit is undefined
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl PipelineError {
    pub(crate) fn malformed(source_name: &str, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}
