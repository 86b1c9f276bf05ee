//! Surfer ASCII grid (`DSAA`) files, used for DEMs and mass balance grids.
//!
//! Layout:
//! ```text
//! DSAA
//! NCOLS NROWS
//! xmin xmax
//! ymin ymax
//! zmin zmax        (optional on input, always written)
//! NROWS rows of NCOLS values
//! ```
use std::path::Path;

use super::{join, parse_token, read_text, write_text};
use crate::error::{CouplerError, Result};
use crate::grid::{pixel_total, Grid, GridExtent};

pub const GSA_TAG: &str = "DSAA";

/// Parse a grid. Values are read as a token stream so wrapped rows are
/// accepted; the optional `zmin zmax` pair is detected from the count.
pub fn parse_gsa(text: &str, source_name: &str) -> Result<Grid> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let (n, tag) = next_header(&mut lines, "DSAA tag", source_name)?;
    if tag.first() != Some(&GSA_TAG) {
        return Err(CouplerError::format(source_name, n, "first line must be the DSAA tag"));
    }
    let (n, dims) = next_header(&mut lines, "NCOLS NROWS", source_name)?;
    let [cols, rows] = pair::<usize>(&dims, "NCOLS NROWS", source_name, n)?;
    let expected = pixel_total(rows, cols).map_err(|m| CouplerError::format(source_name, n, m))?;
    let (n, xs) = next_header(&mut lines, "xmin xmax", source_name)?;
    let [x_min, x_max] = pair::<f64>(&xs, "xmin xmax", source_name, n)?;
    let (n, ys) = next_header(&mut lines, "ymin ymax", source_name)?;
    let [y_min, y_max] = pair::<f64>(&ys, "ymin ymax", source_name, n)?;

    let mut values = Vec::new();
    for (n, line) in lines {
        for token in line.split_whitespace() {
            values.push(parse_token::<f64>(token, "grid value", source_name, n + 1)?);
        }
    }
    let data = if values.len().checked_sub(2) == Some(expected) {
        values.split_off(2)
    } else if values.len() == expected {
        values
    } else {
        return Err(CouplerError::format(
            source_name,
            0,
            format!("{rows}x{cols} grid needs {expected} values, found {}", values.len()),
        ));
    };

    Grid::from_data(cols, rows, GridExtent { x_min, x_max, y_min, y_max }, data)
}

fn next_header<'a>(
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
    what: &str,
    source_name: &str,
) -> Result<(usize, Vec<&'a str>)> {
    lines
        .next()
        .map(|(n, l)| (n + 1, l.split_whitespace().collect()))
        .ok_or_else(|| CouplerError::format(source_name, 0, format!("missing {what} header line")))
}

fn pair<T>(tokens: &[&str], what: &str, source_name: &str, line: usize) -> Result<[T; 2]>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if tokens.len() != 2 {
        return Err(CouplerError::format(
            source_name,
            line,
            format!("expected `{what}`, found {} fields", tokens.len()),
        ));
    }
    Ok([
        parse_token(tokens[0], what, source_name, line)?,
        parse_token(tokens[1], what, source_name, line)?,
    ])
}

/// Serialise a grid, including a `zmin zmax` line computed from the data.
pub fn write_gsa(grid: &Grid) -> String {
    let mut out = String::new();
    out.push_str(GSA_TAG);
    out.push('\n');
    out.push_str(&format!("{} {}\n", grid.cols, grid.rows));
    out.push_str(&format!("{} {}\n", grid.extent.x_min, grid.extent.x_max));
    out.push_str(&format!("{} {}\n", grid.extent.y_min, grid.extent.y_max));
    let (z_min, z_max) = if grid.data.is_empty() {
        (0.0, 0.0)
    } else {
        (grid.min_value(), grid.max_value())
    };
    out.push_str(&format!("{z_min} {z_max}\n"));
    for r in 0..grid.rows {
        out.push_str(&join(grid.row(r)));
        out.push('\n');
    }
    out
}

pub fn read_gsa_file(path: &Path) -> Result<Grid> {
    parse_gsa(&read_text(path)?, &path.display().to_string())
}

pub fn write_gsa_file(path: &Path, grid: &Grid) -> Result<()> {
    write_text(path, &write_gsa(grid))
}
