//! Error types for the modeling pipeline.
//!
//! Only configuration and data-shape problems are errors. Fits that fail to
//! converge and metrics with a zero denominator are ordinary results.

use thiserror::Error;

/// Precondition violations raised by pipeline operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// Train fraction outside the open interval (0, 1).
    #[error("train fraction must lie strictly between 0 and 1, got {0}")]
    InvalidSplitProportion(f64),

    /// Fold count below 2 or above the number of rows.
    #[error("fold count must be between 2 and the number of rows ({rows}), got {folds}")]
    InvalidFoldCount { folds: usize, rows: usize },

    /// An operation received no rows.
    #[error("dataset is empty")]
    EmptyDataset,

    /// Two inputs that must line up row-for-row do not.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A categorical level that the encoding (or mapping) does not know about.
    #[error("level '{level}' of '{attribute}' is unknown")]
    UnknownLevel { attribute: String, level: String },

    /// A caller-supplied reference level that never occurs in the data.
    #[error("reference level '{level}' does not occur in '{attribute}'")]
    UnknownReference { attribute: String, level: String },

    /// The response has fewer than two distinct categories.
    #[error("response must contain at least two categories, found {0}")]
    DegenerateResponse(usize),

    /// A required column is absent from the input table.
    #[error("required column '{0}' is missing from the input")]
    MissingColumn(String),

    /// A response value that cannot be used for fitting.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A configuration value outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
