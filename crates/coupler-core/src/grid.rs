use serde::{Deserialize, Serialize};

use crate::error::{CouplerError, Result};

/// Horizontal extent of a grid, as declared in its file header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridExtent {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Default for GridExtent {
    fn default() -> Self {
        Self { x_min: 0.0, x_max: 1.0, y_min: 0.0, y_max: 1.0 }
    }
}

/// A 2D pixel grid of f64 values (elevations in metres, or mass balance),
/// row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Row-major values.
    pub data: Vec<f64>,
    pub cols: usize,
    pub rows: usize,
    pub extent: GridExtent,
}

impl Grid {
    /// Wrap row-major data. The length must equal `cols × rows`.
    pub fn from_data(cols: usize, rows: usize, extent: GridExtent, data: Vec<f64>) -> Result<Self> {
        let expected = pixel_total(rows, cols).map_err(CouplerError::Consistency)?;
        if data.len() != expected {
            return Err(CouplerError::Consistency(format!(
                "grid of {rows}x{cols} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self { data, cols, rows, extent })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn min_value(&self) -> f64 {
        self.data.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn max_value(&self) -> f64 {
        self.data.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Fail unless `other` has the same row and column counts.
    pub fn ensure_same_shape(&self, name: &str, other: &Grid, other_name: &str) -> Result<()> {
        ensure_dimensions(name, self.rows, self.cols, other_name, other.rows, other.cols)
    }
}

/// `rows × cols`, or a message saying the declared size cannot be indexed.
pub(crate) fn pixel_total(rows: usize, cols: usize) -> std::result::Result<usize, String> {
    rows.checked_mul(cols)
        .ok_or_else(|| format!("a {rows}x{cols} grid has more pixels than can be addressed"))
}

pub(crate) fn ensure_dimensions(
    left: &str,
    left_rows: usize,
    left_cols: usize,
    right: &str,
    right_rows: usize,
    right_cols: usize,
) -> Result<()> {
    if left_rows != right_rows || left_cols != right_cols {
        return Err(CouplerError::DimensionMismatch {
            left: left.to_string(),
            left_rows,
            left_cols,
            right: right.to_string(),
            right_rows,
            right_cols,
        });
    }
    Ok(())
}
