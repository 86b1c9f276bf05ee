//! Vegetation parameter table.
//!
//! One `cell_id tile_count` line per cell, followed by `tile_count` tile
//! lines of nine fields:
//! `veg_class area_fraction r1 r2 r3 r4 r5 r6 band_index`.
use std::path::Path;

use indexmap::IndexMap;

use super::{join, parse_token, read_text};
use crate::config::RootParams;
use crate::error::{CouplerError, Result};
use crate::tiles::{CellId, CellTable, VegetationTile};

/// Tiles per cell in file order.
pub type VegetationTable = IndexMap<CellId, Vec<VegetationTile>>;

const TILE_FIELDS: usize = 9;

pub fn parse_vegetation_table(text: &str, source_name: &str) -> Result<VegetationTable> {
    let mut table = VegetationTable::new();
    // (cell, declared count, line of the header)
    let mut current: Option<(CellId, usize, usize)> = None;

    for (i, line) in text.lines().enumerate() {
        let n = i + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.len() {
            0 => continue,
            2 => {
                check_tile_count(&table, current.take(), source_name)?;
                let id = fields[0].to_string();
                let declared: usize = parse_token(fields[1], "tile count", source_name, n)?;
                if table.insert(id.clone(), Vec::with_capacity(declared)).is_some() {
                    return Err(CouplerError::format(source_name, n, format!("cell {id} listed twice")));
                }
                current = Some((id, declared, n));
            }
            TILE_FIELDS => {
                let Some((id, _, _)) = &current else {
                    return Err(CouplerError::format(source_name, n, "tile line before any cell header"));
                };
                let tile = parse_tile(&fields, source_name, n)?;
                if let Some(tiles) = table.get_mut(id) {
                    tiles.push(tile);
                }
            }
            other => {
                return Err(CouplerError::format(
                    source_name,
                    n,
                    format!("expected 2 (cell header) or {TILE_FIELDS} (tile) fields, found {other}"),
                ))
            }
        }
    }
    check_tile_count(&table, current, source_name)?;
    Ok(table)
}

fn check_tile_count(
    table: &VegetationTable,
    header: Option<(CellId, usize, usize)>,
    source_name: &str,
) -> Result<()> {
    if let Some((id, declared, line)) = header {
        let found = table.get(&id).map_or(0, Vec::len);
        if found != declared {
            return Err(CouplerError::format(
                source_name,
                line,
                format!("cell {id} declares {declared} tiles but {found} follow"),
            ));
        }
    }
    Ok(())
}

fn parse_tile(fields: &[&str], source_name: &str, n: usize) -> Result<VegetationTile> {
    let veg_class: u32 = parse_token(fields[0], "vegetation class", source_name, n)?;
    let area_fraction: f64 = parse_token(fields[1], "area fraction", source_name, n)?;
    if area_fraction < 0.0 {
        return Err(CouplerError::format(
            source_name,
            n,
            format!("negative area fraction {area_fraction} for vegetation class {veg_class}"),
        ));
    }
    let mut roots = [0.0; 6];
    for (k, slot) in roots.iter_mut().enumerate() {
        *slot = parse_token(fields[2 + k], "root parameter", source_name, n)?;
    }
    let band: usize = parse_token(fields[8], "band index", source_name, n)?;
    Ok(VegetationTile { veg_class, area_fraction, root_params: RootParams(roots), band })
}

/// Serialise the current tile table. Tile counts are recomputed, so cells
/// that gained bare-soil or glacier tiles declare them.
pub fn write_vegetation_table(cells: &CellTable) -> String {
    let mut out = String::new();
    for cell in cells.iter() {
        out.push_str(&format!("{} {}\n", cell.id, cell.tile_count()));
        for band in &cell.bands {
            for tile in band.tiles() {
                out.push_str(&format!(
                    "{} {} {} {}\n",
                    tile.veg_class,
                    tile.area_fraction,
                    join(&tile.root_params.0),
                    tile.band
                ));
            }
        }
    }
    out
}

/// A one-line file of exactly six root parameters.
pub fn parse_root_params(text: &str, source_name: &str) -> Result<RootParams> {
    let Some((i, line)) = text.lines().enumerate().find(|(_, l)| !l.trim().is_empty()) else {
        return Err(CouplerError::format(source_name, 0, "no root parameters found"));
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(CouplerError::format(
            source_name,
            i + 1,
            format!("expected 6 root parameters, found {}", fields.len()),
        ));
    }
    let mut roots = [0.0; 6];
    for (slot, token) in roots.iter_mut().zip(&fields) {
        *slot = parse_token(token, "root parameter", source_name, i + 1)?;
    }
    Ok(RootParams(roots))
}

pub fn read_vegetation_file(path: &Path) -> Result<VegetationTable> {
    parse_vegetation_table(&read_text(path)?, &path.display().to_string())
}

pub fn read_root_params_file(path: &Path) -> Result<RootParams> {
    parse_root_params(&read_text(path)?, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
101 3
1 0.35 0.10 1.00 0.10 0.00 0.10 0.00 0
22 0.15 0.10 1.00 0.10 0.00 0.10 0.00 0
22 0.5 0.10 1.00 0.10 0.00 0.10 0.00 1
102 1
4 1.0 0.30 0.60 0.70 0.40 0.00 0.00 0
";

    #[test]
    fn parses_cells_and_tiles() {
        let t = parse_vegetation_table(SAMPLE, "vpf").unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t["101"].len(), 3);
        assert_eq!(t["101"][2].band, 1);
        assert_eq!(t["102"][0].root_params.0[3], 0.40);
    }

    #[test]
    fn tile_count_mismatch_is_rejected() {
        let text = "101 2\n1 0.35 0.1 1 0.1 0 0.1 0 0\n";
        assert!(matches!(parse_vegetation_table(text, "vpf"), Err(CouplerError::Format { line: 1, .. })));
    }

    #[test]
    fn tile_before_header_is_rejected() {
        let text = "1 0.35 0.1 1 0.1 0 0.1 0 0\n";
        assert!(matches!(parse_vegetation_table(text, "vpf"), Err(CouplerError::Format { line: 1, .. })));
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        let text = "101 1\n1 0.35 0.1 1 0.1 0 0\n";
        assert!(matches!(parse_vegetation_table(text, "vpf"), Err(CouplerError::Format { line: 2, .. })));
    }

    #[test]
    fn write_recomputes_counts_and_reparses() {
        use crate::formats::snow_bands::parse_snow_bands;

        let snow = parse_snow_bands(
            "101 0.5 0.5 1850 1950 1 1\n102 1.0 0.0 1850 1950 1 1\n",
            2,
            "snb",
        )
        .unwrap();
        let veg = parse_vegetation_table(SAMPLE, "vpf").unwrap();
        let mut cells = CellTable::assemble(veg.clone(), &snow).unwrap();
        cells
            .get_mut("102")
            .unwrap()
            .bands[1]
            .get_or_insert_tile(19, RootParams([0.1, 1.0, 0.1, 0.0, 0.1, 0.0]));

        let text = write_vegetation_table(&cells);
        assert!(text.lines().any(|l| l == "102 2"));
        let reparsed = parse_vegetation_table(&text, "out").unwrap();
        assert_eq!(reparsed["101"], veg["101"]);
        assert_eq!(reparsed["102"].len(), 2);
        assert_eq!(write_vegetation_table(&CellTable::assemble(reparsed, &snow).unwrap()), text);
    }

    #[test]
    fn root_params_need_six_values() {
        assert_eq!(
            parse_root_params("0.1 1.0 0.1 0.0 0.1 0.0\n", "roots").unwrap(),
            RootParams([0.1, 1.0, 0.1, 0.0, 0.1, 0.0])
        );
        assert!(parse_root_params("0.1 1.0 0.1\n", "roots").is_err());
    }
}
