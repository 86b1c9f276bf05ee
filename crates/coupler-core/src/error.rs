//! Error taxonomy for the coupler.
//!
//! Every variant is fatal for the run. Format errors come from malformed
//! input files, consistency errors from two inputs that disagree, and
//! conservation errors from a quantity that went negative during
//! reconciliation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CouplerError>;

#[derive(Debug, Error)]
pub enum CouplerError {
    #[error("{source_name}:{line}: {message}")]
    Format {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("inconsistent inputs: {0}")]
    Consistency(String),

    #[error("grid dimensions disagree: {left} is {left_rows}x{left_cols}, {right} is {right_rows}x{right_cols}")]
    DimensionMismatch {
        left: String,
        left_rows: usize,
        left_cols: usize,
        right: String,
        right_rows: usize,
        right_cols: usize,
    },

    #[error("unknown cell id {cell} ({context})")]
    UnknownCell { cell: String, context: String },

    #[error("cell {cell}, band {band}: {quantity} is negative ({value})")]
    Conservation {
        cell: String,
        band: usize,
        quantity: String,
        value: f64,
    },

    #[error("surface below bed at row {row}, column {col}: surface {surface}, bed {bed}")]
    NegativeIceThickness {
        row: usize,
        col: usize,
        surface: f64,
        bed: f64,
    },

    #[error("cell {cell}: pixel at row {row}, column {col} (elevation {elevation}) falls outside every band window")]
    UnbandedPixel {
        cell: String,
        row: usize,
        col: usize,
        elevation: f64,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{model} model failed: {message}")]
    ExternalModel { model: String, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CouplerError {
    pub(crate) fn format(source_name: &str, line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            source_name: source_name.to_string(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn conservation(cell: &str, band: usize, quantity: impl Into<String>, value: f64) -> Self {
        Self::Conservation {
            cell: cell.to_string(),
            band,
            quantity: quantity.into(),
            value,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// True for the negative-quantity class of failures.
    pub fn is_conservation(&self) -> bool {
        matches!(self, Self::Conservation { .. } | Self::NegativeIceThickness { .. })
    }
}
