//! Pixel → cell mapping file.
//!
//! ```text
//! NCOLS 120
//! NROWS 80
//! "ID" "ROW" "COL" "AREA" "ELEV" "CELL_ID"
//! 1 0 0 0.0081 2034 12345
//! 2 0 1 0.0081 2051 NA
//! ```
//! Both dimension declarations must precede the first data row. Lines
//! whose first token starts with `"` are headers or comments. `NA` in the
//! cell column leaves the pixel unassigned.
use std::path::Path;

use super::{parse_token, read_text};
use crate::error::{CouplerError, Result};
use crate::pixel_map::PixelCellMap;

pub const UNASSIGNED_CELL: &str = "NA";

const ROW_FIELD: usize = 1;
const COL_FIELD: usize = 2;
const ELEV_FIELD: usize = 4;
const CELL_FIELD: usize = 5;

pub fn parse_pixel_map(text: &str, source_name: &str) -> Result<PixelCellMap> {
    let mut cols: Option<usize> = None;
    let mut rows: Option<usize> = None;
    let mut map: Option<PixelCellMap> = None;

    for (i, line) in text.lines().enumerate() {
        let n = i + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some(&first) = fields.first() else { continue };

        match first {
            "NCOLS" | "NROWS" => {
                if map.is_some() {
                    return Err(CouplerError::format(source_name, n, format!("{first} declared after data rows")));
                }
                let value = fields
                    .get(1)
                    .ok_or_else(|| CouplerError::format(source_name, n, format!("{first} has no value")))?;
                let value: usize = parse_token(value, first, source_name, n)?;
                if first == "NCOLS" {
                    cols = Some(value);
                } else {
                    rows = Some(value);
                }
            }
            _ if first.starts_with('"') => {}
            _ => {
                if map.is_none() {
                    let (Some(r), Some(c)) = (rows, cols) else {
                        return Err(CouplerError::format(
                            source_name,
                            n,
                            "data row before NCOLS and NROWS were declared",
                        ));
                    };
                    map = Some(sized_map(r, c, source_name, n)?);
                }
                let Some(map) = map.as_mut() else { continue };
                if fields.len() <= CELL_FIELD {
                    return Err(CouplerError::format(
                        source_name,
                        n,
                        format!("expected at least {} fields, found {}", CELL_FIELD + 1, fields.len()),
                    ));
                }
                let row: usize = parse_token(fields[ROW_FIELD], "row", source_name, n)?;
                let col: usize = parse_token(fields[COL_FIELD], "column", source_name, n)?;
                let elevation: f64 = parse_token(fields[ELEV_FIELD], "elevation", source_name, n)?;
                let cell = fields[CELL_FIELD];
                if row >= map.rows() || col >= map.cols() {
                    return Err(CouplerError::format(
                        source_name,
                        n,
                        format!("pixel ({row}, {col}) outside the declared {}x{} grid", map.rows(), map.cols()),
                    ));
                }
                if cell == UNASSIGNED_CELL {
                    continue;
                }
                if !map.assign(row, col, cell.to_string(), elevation)? {
                    return Err(CouplerError::format(
                        source_name,
                        n,
                        format!("pixel ({row}, {col}) assigned twice"),
                    ));
                }
            }
        }
    }

    match (map, rows, cols) {
        (Some(m), _, _) => Ok(m),
        (None, Some(r), Some(c)) => sized_map(r, c, source_name, 0),
        _ => Err(CouplerError::format(source_name, 0, "NCOLS and NROWS were never declared")),
    }
}

/// An empty map for the declared size, reporting an unusable size against `line`.
fn sized_map(rows: usize, cols: usize, source_name: &str, line: usize) -> Result<PixelCellMap> {
    PixelCellMap::new(rows, cols).map_err(|e| match e {
        CouplerError::Consistency(message) => CouplerError::format(source_name, line, message),
        other => other,
    })
}

pub fn read_pixel_map_file(path: &Path) -> Result<PixelCellMap> {
    parse_pixel_map(&read_text(path)?, &path.display().to_string())
}
