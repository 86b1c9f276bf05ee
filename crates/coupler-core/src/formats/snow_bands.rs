//! Snow band table: `cell_id  f_0..f_N-1  z_0..z_N-1  p_0..p_N-1`, one line
//! per cell, with area fractions, median elevations and precipitation
//! factors for each of the N bands.
use std::path::Path;

use indexmap::IndexMap;

use super::{join, parse_token, read_text};
use crate::error::{CouplerError, Result};
use crate::tiles::{CellId, CellTable};

#[derive(Debug, Clone, PartialEq)]
pub struct SnowBandRow {
    pub area_fractions: Vec<f64>,
    pub median_elevations: Vec<f64>,
    pub precip_factors: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnowBandTable {
    pub band_count: usize,
    pub rows: IndexMap<CellId, SnowBandRow>,
}

pub fn parse_snow_bands(text: &str, band_count: usize, source_name: &str) -> Result<SnowBandTable> {
    if band_count == 0 {
        return Err(CouplerError::Config("snow band count must be at least 1".into()));
    }
    let expected = 3 * band_count + 1;
    let mut rows = IndexMap::new();

    for (i, line) in text.lines().enumerate() {
        let n = i + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != expected {
            return Err(CouplerError::format(
                source_name,
                n,
                format!(
                    "{} fields for {band_count} snow bands, expected {expected}",
                    fields.len()
                ),
            ));
        }
        let values = |offset: usize, what: &str| -> Result<Vec<f64>> {
            fields[offset..offset + band_count]
                .iter()
                .map(|t| parse_token(t, what, source_name, n))
                .collect()
        };
        let row = SnowBandRow {
            area_fractions: values(1, "band area fraction")?,
            median_elevations: values(1 + band_count, "band median elevation")?,
            precip_factors: values(1 + 2 * band_count, "precipitation factor")?,
        };
        let id = fields[0].to_string();
        if rows.insert(id.clone(), row).is_some() {
            return Err(CouplerError::format(source_name, n, format!("cell {id} listed twice")));
        }
    }
    Ok(SnowBandTable { band_count, rows })
}

/// Emit the table with the current band area fractions, rows in the order
/// the snow band file was read. Elevations and precipitation factors pass
/// through unchanged.
pub fn write_snow_bands(cells: &CellTable) -> String {
    let mut out = String::new();
    for cell in cells.iter_snow_order() {
        let fractions: Vec<f64> = cell.bands.iter().map(|b| b.area_fraction).collect();
        let elevations: Vec<f64> = cell.bands.iter().map(|b| b.median_elevation).collect();
        let precip: Vec<f64> = cell.bands.iter().map(|b| b.precip_factor).collect();
        out.push_str(&format!(
            "{} {} {} {}\n",
            cell.id,
            join(&fractions),
            join(&elevations),
            join(&precip)
        ));
    }
    out
}

pub fn read_snow_band_file(path: &Path, band_count: usize) -> Result<SnowBandTable> {
    parse_snow_bands(&read_text(path)?, band_count, &path.display().to_string())
}
