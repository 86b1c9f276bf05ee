//! Cell / elevation band / vegetation tile data model.
//!
//! Band topology is fixed once the table is assembled; only fractions and
//! tile membership change from year to year. Tiles inside a band are kept
//! sorted ascending by vegetation class, so every lookup and insertion is a
//! binary search.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::RootParams;
use crate::error::{CouplerError, Result};
use crate::formats::snow_bands::SnowBandTable;
use crate::formats::veg_params::VegetationTable;

pub type CellId = String;

/// One land-cover tile (HRU) inside an elevation band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VegetationTile {
    pub veg_class: u32,
    /// Fraction of the whole cell's area, not of the band's.
    pub area_fraction: f64,
    pub root_params: RootParams,
    /// Index of the owning band.
    pub band: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationBand {
    /// Position in the snow band table.
    pub index: usize,
    /// Lower edge of the band window, a multiple of the band width.
    pub lower_bound: i64,
    /// Fraction of the cell covered by this band.
    pub area_fraction: f64,
    /// Fraction of the cell covered by this band's glacier portion.
    pub glacier_fraction: f64,
    pub median_elevation: f64,
    pub precip_factor: f64,
    tiles: Vec<VegetationTile>,
}

impl ElevationBand {
    pub fn new(index: usize, area_fraction: f64, median_elevation: f64, precip_factor: f64) -> Self {
        Self {
            index,
            lower_bound: 0,
            area_fraction,
            glacier_fraction: 0.0,
            median_elevation,
            precip_factor,
            tiles: Vec::new(),
        }
    }

    pub fn tiles(&self) -> &[VegetationTile] {
        &self.tiles
    }

    fn position(&self, veg_class: u32) -> std::result::Result<usize, usize> {
        self.tiles.binary_search_by_key(&veg_class, |t| t.veg_class)
    }

    pub fn tile(&self, veg_class: u32) -> Option<&VegetationTile> {
        self.position(veg_class).ok().map(|i| &self.tiles[i])
    }

    pub fn tile_mut(&mut self, veg_class: u32) -> Option<&mut VegetationTile> {
        match self.position(veg_class) {
            Ok(i) => Some(&mut self.tiles[i]),
            Err(_) => None,
        }
    }

    /// Insert a tile at its sorted position and return that position.
    /// A tile whose class is already present is handed back unchanged.
    pub fn insert_tile(&mut self, mut tile: VegetationTile) -> std::result::Result<usize, VegetationTile> {
        match self.position(tile.veg_class) {
            Ok(_) => Err(tile),
            Err(pos) => {
                tile.band = self.index;
                self.tiles.insert(pos, tile);
                Ok(pos)
            }
        }
    }

    /// Return the tile of `veg_class`, inserting a zero-fraction tile with
    /// `root_params` at its sorted position if the band lacks one.
    pub fn get_or_insert_tile(&mut self, veg_class: u32, root_params: RootParams) -> &mut VegetationTile {
        let pos = match self.position(veg_class) {
            Ok(pos) => pos,
            Err(pos) => {
                self.tiles.insert(
                    pos,
                    VegetationTile {
                        veg_class,
                        area_fraction: 0.0,
                        root_params,
                        band: self.index,
                    },
                );
                pos
            }
        };
        &mut self.tiles[pos]
    }

    /// Mutable access to tile fractions. The class is handed out by value
    /// so the sort order cannot be disturbed.
    pub fn fractions_mut(&mut self) -> impl Iterator<Item = (u32, &mut f64)> {
        self.tiles.iter_mut().map(|t| (t.veg_class, &mut t.area_fraction))
    }

    /// Sum of the fractions of every tile that is not `glacier_id`.
    pub fn non_glacier_fraction(&self, glacier_id: u32) -> f64 {
        self.tiles
            .iter()
            .filter(|t| t.veg_class != glacier_id)
            .map(|t| t.area_fraction)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    /// Number of pixels mapped to this cell; denominator of every fraction.
    pub pixel_count: usize,
    pub bands: Vec<ElevationBand>,
}

impl Cell {
    pub fn tile_count(&self) -> usize {
        self.bands.iter().map(|b| b.tiles.len()).sum()
    }
}

/// All cells of the run, in vegetation-table order. The snow band table's
/// row order is remembered separately so that file can be written back in
/// its own order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellTable {
    cells: IndexMap<CellId, Cell>,
    /// Slots into `cells`, in snow band table order.
    snow_order: Vec<usize>,
}

impl CellTable {
    /// Build the cell/band/tile topology from the vegetation table and the
    /// snow band table. Both must describe the same set of cells.
    pub fn assemble(veg: VegetationTable, snow: &SnowBandTable) -> Result<Self> {
        if let Some(orphan) = snow.rows.keys().find(|id| !veg.contains_key(*id)) {
            return Err(CouplerError::UnknownCell {
                cell: orphan.clone(),
                context: "present in the snow band table but not in the vegetation table".into(),
            });
        }

        let mut cells = IndexMap::with_capacity(veg.len());
        for (id, tiles) in veg {
            let row = snow.rows.get(&id).ok_or_else(|| CouplerError::UnknownCell {
                cell: id.clone(),
                context: "present in the vegetation table but not in the snow band table".into(),
            })?;

            let mut bands: Vec<ElevationBand> = (0..snow.band_count)
                .map(|i| {
                    ElevationBand::new(
                        i,
                        row.area_fractions[i],
                        row.median_elevations[i],
                        row.precip_factors[i],
                    )
                })
                .collect();

            for tile in tiles {
                let band_count = bands.len();
                let band = bands.get_mut(tile.band).ok_or_else(|| {
                    CouplerError::Consistency(format!(
                        "cell {id}: tile of class {} names band {} but only {band_count} bands exist",
                        tile.veg_class, tile.band
                    ))
                })?;
                band.insert_tile(tile).map_err(|dup| {
                    CouplerError::Consistency(format!(
                        "cell {id}, band {}: vegetation class {} listed twice",
                        dup.band, dup.veg_class
                    ))
                })?;
            }

            cells.insert(id.clone(), Cell { id, pixel_count: 0, bands });
        }
        let snow_order = snow.rows.keys().filter_map(|id| cells.get_index_of(id)).collect();
        Ok(Self { cells, snow_order })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cells.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    /// Position of a cell in table order.
    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.cells.get_index_of(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.values_mut()
    }

    /// Cells in the row order of the snow band table they were assembled from.
    pub fn iter_snow_order(&self) -> impl Iterator<Item = &Cell> {
        self.snow_order.iter().filter_map(|&slot| self.cells.get_index(slot).map(|(_, c)| c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ROOT_PARAMS;
    use crate::formats::snow_bands::SnowBandRow;

    fn tile(veg_class: u32, area_fraction: f64, band: usize) -> VegetationTile {
        VegetationTile { veg_class, area_fraction, root_params: DEFAULT_ROOT_PARAMS, band }
    }

    fn snow(ids: &[&str], n: usize) -> SnowBandTable {
        let mut t = SnowBandTable { band_count: n, rows: IndexMap::new() };
        for id in ids {
            t.rows.insert(
                id.to_string(),
                SnowBandRow {
                    area_fractions: vec![1.0 / n as f64; n],
                    median_elevations: (0..n).map(|i| 1000.0 + 100.0 * i as f64).collect(),
                    precip_factors: vec![1.0; n],
                },
            );
        }
        t
    }

    #[test]
    fn insertion_keeps_tiles_sorted() {
        let mut band = ElevationBand::new(0, 1.0, 1500.0, 1.0);
        for class in [11, 3, 22, 19, 7] {
            band.insert_tile(tile(class, 0.1, 0)).unwrap();
        }
        let classes: Vec<u32> = band.tiles().iter().map(|t| t.veg_class).collect();
        assert_eq!(classes, vec![3, 7, 11, 19, 22]);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut band = ElevationBand::new(0, 1.0, 1500.0, 1.0);
        band.insert_tile(tile(5, 0.4, 0)).unwrap();
        let rejected = band.insert_tile(tile(5, 0.2, 0)).unwrap_err();
        assert_eq!(rejected.area_fraction, 0.2);
        assert_eq!(band.tiles().len(), 1);
    }

    #[test]
    fn get_or_insert_places_new_tile_in_order() {
        let mut band = ElevationBand::new(2, 1.0, 1500.0, 1.0);
        band.insert_tile(tile(4, 0.5, 2)).unwrap();
        band.insert_tile(tile(22, 0.5, 2)).unwrap();
        band.get_or_insert_tile(19, DEFAULT_ROOT_PARAMS).area_fraction += 0.2;
        let classes: Vec<u32> = band.tiles().iter().map(|t| t.veg_class).collect();
        assert_eq!(classes, vec![4, 19, 22]);
        assert_eq!(band.tile(19).unwrap().band, 2);
        assert_eq!(band.tile(19).unwrap().area_fraction, 0.2);
    }

    #[test]
    fn assemble_attaches_tiles_to_bands() {
        let mut veg = VegetationTable::new();
        veg.insert("12".into(), vec![tile(22, 0.3, 1), tile(1, 0.2, 0), tile(19, 0.2, 1)]);
        let table = CellTable::assemble(veg, &snow(&["12"], 2)).unwrap();
        let cell = table.get("12").unwrap();
        assert_eq!(cell.bands.len(), 2);
        assert_eq!(cell.bands[0].tiles().len(), 1);
        assert_eq!(cell.bands[1].tiles()[0].veg_class, 19);
        assert_eq!(cell.tile_count(), 3);
    }

    #[test]
    fn assemble_rejects_band_out_of_range() {
        let mut veg = VegetationTable::new();
        veg.insert("12".into(), vec![tile(1, 0.2, 3)]);
        assert!(matches!(
            CellTable::assemble(veg, &snow(&["12"], 2)),
            Err(CouplerError::Consistency(_))
        ));
    }

    #[test]
    fn assemble_rejects_mismatched_cell_sets() {
        let mut veg = VegetationTable::new();
        veg.insert("12".into(), vec![tile(1, 0.2, 0)]);
        let err = CellTable::assemble(veg, &snow(&["12", "13"], 1)).unwrap_err();
        assert!(matches!(err, CouplerError::UnknownCell { ref cell, .. } if cell == "13"));
    }

    #[test]
    fn snow_order_is_kept_apart_from_table_order() {
        let mut veg = VegetationTable::new();
        veg.insert("12".into(), vec![tile(1, 1.0, 0)]);
        veg.insert("13".into(), vec![tile(1, 1.0, 0)]);
        let table = CellTable::assemble(veg, &snow(&["13", "12"], 1)).unwrap();
        let table_order: Vec<&str> = table.iter().map(|c| c.id.as_str()).collect();
        let snow_order: Vec<&str> = table.iter_snow_order().map(|c| c.id.as_str()).collect();
        assert_eq!(table_order, vec!["12", "13"]);
        assert_eq!(snow_order, vec!["13", "12"]);
        assert_eq!(table.slot_of("13"), Some(1));
    }
}
