//! Elevation band windows per cell.
//!
//! Each band covers `[lower, lower + band_size)` where `lower` is the
//! band's representative elevation rounded down to a multiple of the band
//! width. Band index is the table position, not elevation rank, and a pixel
//! is matched to the first window in table order that contains it.

use crate::error::{CouplerError, Result};
use crate::tiles::CellTable;

/// Lower edge of the band window containing `elevation`.
pub fn band_lower_bound(elevation: f64, band_size: i64) -> i64 {
    let e = elevation.floor() as i64;
    e - e.rem_euclid(band_size)
}

/// Static per-cell band windows, indexed by cell slot in the cell table.
#[derive(Debug, Clone, PartialEq)]
pub struct BandMap {
    band_size: i64,
    lower_bounds: Vec<Vec<i64>>,
}

impl BandMap {
    /// Derive the windows from each band's median elevation and write the
    /// lower bounds back onto the bands.
    pub fn build(cells: &mut CellTable, band_size: i64) -> Result<Self> {
        if band_size <= 0 {
            return Err(CouplerError::Config(format!("band_size must be positive, got {band_size}")));
        }
        let mut lower_bounds = Vec::with_capacity(cells.len());
        for cell in cells.iter_mut() {
            let bounds: Vec<i64> = cell
                .bands
                .iter_mut()
                .map(|band| {
                    band.lower_bound = band_lower_bound(band.median_elevation, band_size);
                    band.lower_bound
                })
                .collect();
            lower_bounds.push(bounds);
        }
        Ok(Self { band_size, lower_bounds })
    }

    pub fn band_size(&self) -> i64 {
        self.band_size
    }

    pub fn lower_bounds(&self, slot: usize) -> &[i64] {
        &self.lower_bounds[slot]
    }

    /// Band index whose window holds `elevation`, or `None` if no window of
    /// the cell does. Elevations are truncated to whole metres first.
    pub fn locate(&self, slot: usize, elevation: f64) -> Option<usize> {
        let e = elevation.trunc() as i64;
        self.lower_bounds[slot]
            .iter()
            .position(|&lower| e >= lower && e < lower + self.band_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::snow_bands::{SnowBandRow, SnowBandTable};
    use crate::formats::veg_params::VegetationTable;
    use indexmap::IndexMap;

    fn cells_with_elevations(elevs: &[f64]) -> CellTable {
        let n = elevs.len();
        let mut rows = IndexMap::new();
        rows.insert(
            "1".to_string(),
            SnowBandRow {
                area_fractions: vec![1.0 / n as f64; n],
                median_elevations: elevs.to_vec(),
                precip_factors: vec![1.0; n],
            },
        );
        let mut veg = VegetationTable::new();
        veg.insert("1".to_string(), Vec::new());
        CellTable::assemble(veg, &SnowBandTable { band_count: n, rows }).unwrap()
    }

    #[test]
    fn lower_bound_rounds_down_to_band_width() {
        assert_eq!(band_lower_bound(1850.0, 100), 1800);
        assert_eq!(band_lower_bound(1800.0, 100), 1800);
        assert_eq!(band_lower_bound(1899.9, 100), 1800);
        assert_eq!(band_lower_bound(-50.0, 100), -100);
    }

    #[test]
    fn locate_uses_table_order_not_elevation_rank() {
        let mut cells = cells_with_elevations(&[2050.0, 1950.0, 2150.0]);
        let map = BandMap::build(&mut cells, 100).unwrap();
        assert_eq!(map.lower_bounds(0), &[2000, 1900, 2100]);
        assert_eq!(map.locate(0, 1999.7), Some(1));
        assert_eq!(map.locate(0, 2000.0), Some(0));
        assert_eq!(map.locate(0, 2199.0), Some(2));
        assert_eq!(cells.get("1").unwrap().bands[2].lower_bound, 2100);
    }

    #[test]
    fn elevation_outside_all_windows_is_unbanded() {
        let mut cells = cells_with_elevations(&[1850.0, 1950.0]);
        let map = BandMap::build(&mut cells, 100).unwrap();
        assert_eq!(map.locate(0, 1799.0), None);
        assert_eq!(map.locate(0, 2000.0), None);
    }

    #[test]
    fn rejects_zero_band_size() {
        let mut cells = cells_with_elevations(&[1850.0]);
        assert!(BandMap::build(&mut cells, 0).is_err());
    }
}
