//! Glacier mask from ice thickness: a pixel is glacier when the surface
//! stands above the bed.
use crate::error::{CouplerError, Result};
use crate::grid::{pixel_total, Grid, GridExtent};

#[derive(Debug, Clone, PartialEq)]
pub struct GlacierMask {
    rows: usize,
    cols: usize,
    data: Vec<bool>,
}

impl GlacierMask {
    /// Wrap row-major flags. The length must equal `rows × cols`.
    pub fn from_data(rows: usize, cols: usize, data: Vec<bool>) -> Result<Self> {
        let expected = pixel_total(rows, cols).map_err(CouplerError::Consistency)?;
        if data.len() != expected {
            return Err(CouplerError::Consistency(format!(
                "glacier mask of {rows}x{cols} needs {expected} flags, got {}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[bool] {
        &self.data
    }

    pub fn glacier_pixels(&self) -> usize {
        self.data.iter().filter(|&&g| g).count()
    }

    /// 0/1 grid for writing alongside the DEMs.
    pub fn to_grid(&self, extent: GridExtent) -> Grid {
        Grid {
            data: self.data.iter().map(|&g| if g { 1.0 } else { 0.0 }).collect(),
            cols: self.cols,
            rows: self.rows,
            extent,
        }
    }
}

/// `mask[r][c] = surface[r][c] − bed[r][c] > 0`.
///
/// Fails on the first pixel whose surface lies below the bed.
pub fn update_glacier_mask(surface: &Grid, bed: &Grid) -> Result<GlacierMask> {
    surface.ensure_same_shape("surface DEM", bed, "bed DEM")?;
    let mut data = Vec::with_capacity(surface.data.len());
    for (i, (&s, &b)) in surface.data.iter().zip(bed.data.iter()).enumerate() {
        let thickness = s - b;
        if thickness < 0.0 {
            return Err(CouplerError::NegativeIceThickness {
                row: i / surface.cols,
                col: i % surface.cols,
                surface: s,
                bed: b,
            });
        }
        data.push(thickness > 0.0);
    }
    Ok(GlacierMask { rows: surface.rows, cols: surface.cols, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(cols: usize, rows: usize, data: Vec<f64>) -> Grid {
        Grid::from_data(cols, rows, GridExtent::default(), data).unwrap()
    }

    #[test]
    fn positive_thickness_is_glacier() {
        let surface = grid(3, 1, vec![110.0, 100.0, 100.5]);
        let bed = grid(3, 1, vec![100.0, 100.0, 100.0]);
        let mask = update_glacier_mask(&surface, &bed).unwrap();
        assert_eq!(mask.data(), &[true, false, true]);
        assert_eq!(mask.glacier_pixels(), 2);
    }

    #[test]
    fn surface_below_bed_is_fatal() {
        let surface = grid(2, 2, vec![10.0, 10.0, 10.0, 9.0]);
        let bed = grid(2, 2, vec![10.0; 4]);
        let err = update_glacier_mask(&surface, &bed).unwrap_err();
        assert!(matches!(err, CouplerError::NegativeIceThickness { row: 1, col: 1, .. }));
        assert!(err.is_conservation());
    }

    #[test]
    fn from_data_checks_length() {
        assert!(GlacierMask::from_data(2, 2, vec![true; 4]).is_ok());
        assert!(matches!(
            GlacierMask::from_data(2, 2, vec![true; 3]),
            Err(CouplerError::Consistency(_))
        ));
        assert!(GlacierMask::from_data(usize::MAX, 3, Vec::new()).is_err());
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let surface = grid(2, 1, vec![1.0, 1.0]);
        let bed = grid(1, 2, vec![1.0, 1.0]);
        assert!(matches!(
            update_glacier_mask(&surface, &bed),
            Err(CouplerError::DimensionMismatch { .. })
        ));
    }
}
