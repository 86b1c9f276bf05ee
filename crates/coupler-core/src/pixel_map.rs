//! Static assignment of glacier-model pixels to hydrology cells.
//!
//! Built once from the pixel map file. Elevations and the glacier flag are
//! refreshed every year from the glacier model's surface output; the cell
//! assignment never changes.

use indexmap::IndexMap;

use crate::error::{CouplerError, Result};
use crate::glacier_mask::GlacierMask;
use crate::grid::{ensure_dimensions, pixel_total, Grid};
use crate::tiles::{CellId, CellTable};

#[derive(Debug, Clone, PartialEq)]
pub struct PixelMapEntry {
    /// Owning cell, `None` for pixels outside every cell.
    pub cell: Option<CellId>,
    /// Most recent surface elevation in metres.
    pub elevation: f64,
    pub glacier: bool,
}

impl PixelMapEntry {
    pub const UNASSIGNED: PixelMapEntry = PixelMapEntry { cell: None, elevation: 0.0, glacier: false };
}

#[derive(Debug, Clone, PartialEq)]
pub struct PixelCellMap {
    rows: usize,
    cols: usize,
    entries: Vec<PixelMapEntry>,
    pixel_counts: IndexMap<CellId, usize>,
}

impl PixelCellMap {
    /// An all-unassigned map of `rows × cols` pixels. Fails if the grid
    /// cannot be addressed or allocated.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        let total = pixel_total(rows, cols).map_err(CouplerError::Consistency)?;
        let mut entries = Vec::new();
        entries.try_reserve_exact(total).map_err(|e| {
            CouplerError::Consistency(format!("cannot hold a {rows}x{cols} pixel grid: {e}"))
        })?;
        entries.resize(total, PixelMapEntry::UNASSIGNED);
        Ok(Self { rows, cols, entries, pixel_counts: IndexMap::new() })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Assign pixel (`row`, `col`) to `cell` with its initial elevation.
    /// Returns `false` if the pixel was already assigned.
    pub fn assign(&mut self, row: usize, col: usize, cell: CellId, elevation: f64) -> Result<bool> {
        if row >= self.rows || col >= self.cols {
            return Err(CouplerError::Consistency(format!(
                "pixel ({row}, {col}) lies outside the {}x{} pixel grid",
                self.rows, self.cols
            )));
        }
        let entry = &mut self.entries[row * self.cols + col];
        if entry.cell.is_some() {
            return Ok(false);
        }
        *self.pixel_counts.entry(cell.clone()).or_insert(0) += 1;
        entry.cell = Some(cell);
        entry.elevation = elevation;
        Ok(true)
    }

    #[inline]
    pub fn entry(&self, row: usize, col: usize) -> &PixelMapEntry {
        &self.entries[row * self.cols + col]
    }

    pub fn entries(&self) -> &[PixelMapEntry] {
        &self.entries
    }

    /// Number of pixels owned by `cell` (0 for unknown cells).
    pub fn pixel_count(&self, cell: &str) -> usize {
        self.pixel_counts.get(cell).copied().unwrap_or(0)
    }

    pub fn assigned_pixels(&self) -> usize {
        self.pixel_counts.values().sum()
    }

    /// Fail unless `grid` has the same dimensions as this map.
    pub fn ensure_matches(&self, grid: &Grid, grid_name: &str) -> Result<()> {
        ensure_dimensions("pixel map", self.rows, self.cols, grid_name, grid.rows, grid.cols)
    }

    /// Fail if any assigned pixel names a cell missing from `cells`.
    pub fn ensure_known_cells(&self, cells: &CellTable) -> Result<()> {
        match self.pixel_counts.keys().find(|id| !cells.contains(id)) {
            Some(id) => Err(CouplerError::UnknownCell {
                cell: id.clone(),
                context: "referenced by the pixel map but absent from the vegetation table".into(),
            }),
            None => Ok(()),
        }
    }

    /// Copy the glacier model's new surface and mask into the map.
    /// Unassigned pixels are left untouched.
    pub fn refresh(&mut self, surface: &Grid, mask: &GlacierMask) -> Result<()> {
        self.ensure_matches(surface, "surface DEM")?;
        ensure_dimensions("pixel map", self.rows, self.cols, "glacier mask", mask.rows(), mask.cols())?;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            if entry.cell.is_some() {
                entry.elevation = surface.data[i];
                entry.glacier = mask.data()[i];
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridExtent;

    #[test]
    fn counts_only_assigned_pixels() {
        let mut map = PixelCellMap::new(2, 3).unwrap();
        assert!(map.assign(0, 0, "a".into(), 1200.0).unwrap());
        assert!(map.assign(0, 1, "a".into(), 1210.0).unwrap());
        assert!(map.assign(1, 2, "b".into(), 1500.0).unwrap());
        assert_eq!(map.pixel_count("a"), 2);
        assert_eq!(map.pixel_count("b"), 1);
        assert_eq!(map.pixel_count("zz"), 0);
        assert_eq!(map.assigned_pixels(), 3);
        assert!(map.entry(1, 0).cell.is_none());
    }

    #[test]
    fn second_assignment_is_refused() {
        let mut map = PixelCellMap::new(1, 1).unwrap();
        assert!(map.assign(0, 0, "a".into(), 1.0).unwrap());
        assert!(!map.assign(0, 0, "b".into(), 2.0).unwrap());
        assert_eq!(map.pixel_count("b"), 0);
        assert_eq!(map.entry(0, 0).cell.as_deref(), Some("a"));
    }

    #[test]
    fn unaddressable_grid_is_an_error() {
        assert!(matches!(PixelCellMap::new(usize::MAX, 2), Err(CouplerError::Consistency(_))));
    }

    #[test]
    fn out_of_range_pixel_is_an_error() {
        let mut map = PixelCellMap::new(2, 2).unwrap();
        assert!(map.assign(2, 0, "a".into(), 1.0).is_err());
    }

    #[test]
    fn refresh_skips_unassigned_pixels() {
        let mut map = PixelCellMap::new(1, 2).unwrap();
        map.assign(0, 0, "a".into(), 100.0).unwrap();
        let surface = Grid::from_data(2, 1, GridExtent::default(), vec![150.0, 999.0]).unwrap();
        let mask = GlacierMask::from_data(1, 2, vec![true, true]).unwrap();
        map.refresh(&surface, &mask).unwrap();
        assert_eq!(map.entry(0, 0).elevation, 150.0);
        assert!(map.entry(0, 0).glacier);
        assert_eq!(map.entry(0, 1), &PixelMapEntry::UNASSIGNED);
    }
}
