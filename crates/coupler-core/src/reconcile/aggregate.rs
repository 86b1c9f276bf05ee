//! Pixel → band tallies: one pass over the pixel grid counting band pixels
//! and glacier pixels per cell-band.
//!
//! With the `threading` feature the pass is split by grid row; each rayon
//! worker folds rows into its own tally and the partial tallies are summed,
//! so no counter is shared between threads.

use crate::bands::BandMap;
use crate::config::BandCoverage;
use crate::error::{CouplerError, Result};
use crate::pixel_map::{PixelCellMap, PixelMapEntry};
use crate::tiles::CellTable;

/// Pixel counts indexed by `[cell slot][band index]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BandTally {
    pub band_pixels: Vec<Vec<u64>>,
    pub glacier_pixels: Vec<Vec<u64>>,
    /// Assigned pixels that missed every band window of their cell.
    pub unbanded_pixels: Vec<u64>,
}

impl BandTally {
    pub fn zeros(cells: &CellTable) -> Self {
        let shape: Vec<usize> = cells.iter().map(|c| c.bands.len()).collect();
        Self {
            band_pixels: shape.iter().map(|&n| vec![0; n]).collect(),
            glacier_pixels: shape.iter().map(|&n| vec![0; n]).collect(),
            unbanded_pixels: vec![0; shape.len()],
        }
    }

    /// Total banded pixels of a cell.
    pub fn banded_pixels(&self, slot: usize) -> u64 {
        self.band_pixels[slot].iter().sum()
    }

    #[cfg_attr(not(feature = "threading"), allow(dead_code))]
    fn merge(mut self, other: BandTally) -> BandTally {
        for (a, b) in self.band_pixels.iter_mut().zip(other.band_pixels) {
            a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
        }
        for (a, b) in self.glacier_pixels.iter_mut().zip(other.glacier_pixels) {
            a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
        }
        for (x, y) in self.unbanded_pixels.iter_mut().zip(other.unbanded_pixels) {
            *x += y;
        }
        self
    }

    fn add_row(
        &mut self,
        row: usize,
        entries: &[PixelMapEntry],
        cells: &CellTable,
        band_map: &BandMap,
        coverage: BandCoverage,
    ) -> Result<()> {
        for (col, entry) in entries.iter().enumerate() {
            let Some(cell) = entry.cell.as_deref() else { continue };
            let slot = cells.slot_of(cell).ok_or_else(|| CouplerError::UnknownCell {
                cell: cell.to_string(),
                context: format!("pixel at row {row}, column {col}"),
            })?;
            match band_map.locate(slot, entry.elevation) {
                Some(band) => {
                    self.band_pixels[slot][band] += 1;
                    if entry.glacier {
                        self.glacier_pixels[slot][band] += 1;
                    }
                }
                None => match coverage {
                    BandCoverage::Lenient => self.unbanded_pixels[slot] += 1,
                    BandCoverage::Strict => {
                        return Err(CouplerError::UnbandedPixel {
                            cell: cell.to_string(),
                            row,
                            col,
                            elevation: entry.elevation,
                        })
                    }
                },
            }
        }
        Ok(())
    }
}

/// Single-threaded tally.
pub fn aggregate_serial(
    pixel_map: &PixelCellMap,
    cells: &CellTable,
    band_map: &BandMap,
    coverage: BandCoverage,
) -> Result<BandTally> {
    let mut tally = BandTally::zeros(cells);
    let cols = pixel_map.cols();
    if cols == 0 {
        return Ok(tally);
    }
    for (row, entries) in pixel_map.entries().chunks(cols).enumerate() {
        tally.add_row(row, entries, cells, band_map, coverage)?;
    }
    Ok(tally)
}

/// Tally band and glacier pixels for every cell-band.
#[cfg(not(feature = "threading"))]
pub fn aggregate(
    pixel_map: &PixelCellMap,
    cells: &CellTable,
    band_map: &BandMap,
    coverage: BandCoverage,
) -> Result<BandTally> {
    aggregate_serial(pixel_map, cells, band_map, coverage)
}

/// Tally band and glacier pixels for every cell-band, one rayon task per
/// grid row.
#[cfg(feature = "threading")]
pub fn aggregate(
    pixel_map: &PixelCellMap,
    cells: &CellTable,
    band_map: &BandMap,
    coverage: BandCoverage,
) -> Result<BandTally> {
    use rayon::prelude::*;

    let zero = BandTally::zeros(cells);
    let cols = pixel_map.cols();
    if cols == 0 {
        return Ok(zero);
    }
    pixel_map
        .entries()
        .par_chunks(cols)
        .enumerate()
        .try_fold(
            || zero.clone(),
            |mut acc: BandTally, (row, entries)| -> Result<BandTally> {
                acc.add_row(row, entries, cells, band_map, coverage)?;
                Ok(acc)
            },
        )
        .try_reduce(|| zero.clone(), |a, b| Ok(a.merge(b)))
}
