//! Run-wide state: everything the year loop reads and mutates, owned in
//! one place and threaded through explicitly.

use std::path::Path;

use tracing::{info, warn};

use crate::bands::BandMap;
use crate::config::{CouplerConfig, TileIds};
use crate::error::Result;
use crate::formats::global_params::GlobalParams;
use crate::formats::gsa::read_gsa_file;
use crate::formats::pixel_map_file::read_pixel_map_file;
use crate::formats::snow_bands::{read_snow_band_file, write_snow_bands, SnowBandTable};
use crate::formats::veg_params::{read_vegetation_file, write_vegetation_table, VegetationTable};
use crate::glacier_mask::{update_glacier_mask, GlacierMask};
use crate::grid::Grid;
use crate::mass_balance::{mass_balance_grid, validate_polynomials, PolynomialTable};
use crate::pixel_map::PixelCellMap;
use crate::reconcile::{AreaReconciler, ReconcileReport, ReconcileRules};
use crate::tiles::CellTable;

/// Parsed inputs needed to start a run.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub vegetation: VegetationTable,
    pub snow_bands: SnowBandTable,
    pub pixel_map: PixelCellMap,
    pub bed: Grid,
    /// `GLACIER_ID` from the global file, used when the config sets none.
    pub glacier_id: Option<u32>,
}

impl RunInputs {
    /// Read the vegetation and snow band tables named by the global file,
    /// plus the pixel map and bed DEM.
    pub fn load(globals: &GlobalParams, pixel_map: &Path, bed_dem: &Path) -> Result<Self> {
        let vegetation = read_vegetation_file(&globals.veg_param()?)?;
        let snow_bands = read_snow_band_file(&globals.snow_band_file()?, globals.snow_band_count()?)?;
        Ok(Self {
            vegetation,
            snow_bands,
            pixel_map: read_pixel_map_file(pixel_map)?,
            bed: read_gsa_file(bed_dem)?,
            glacier_id: globals.glacier_id()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunContext {
    config: CouplerConfig,
    ids: TileIds,
    cells: CellTable,
    pixel_map: PixelCellMap,
    band_map: BandMap,
    bed: Grid,
    reconciler: AreaReconciler,
    year: Option<i32>,
}

impl RunContext {
    pub fn new(config: CouplerConfig, inputs: RunInputs) -> Result<Self> {
        config.validate()?;
        let ids = config.tile_ids(inputs.glacier_id)?;

        let mut cells = CellTable::assemble(inputs.vegetation, &inputs.snow_bands)?;
        let pixel_map = inputs.pixel_map;
        pixel_map.ensure_matches(&inputs.bed, "bed DEM")?;
        pixel_map.ensure_known_cells(&cells)?;
        for cell in cells.iter_mut() {
            cell.pixel_count = pixel_map.pixel_count(&cell.id);
        }

        let band_map = BandMap::build(&mut cells, config.band_size)?;
        let reconciler = AreaReconciler::new(ReconcileRules::from_config(&config, ids), &cells)?;

        info!(
            cells = cells.len(),
            bands = inputs.snow_bands.band_count,
            rows = pixel_map.rows(),
            cols = pixel_map.cols(),
            assigned_pixels = pixel_map.assigned_pixels(),
            glacier_id = ids.glacier,
            bare_soil_id = ids.bare_soil,
            "run context ready"
        );

        Ok(Self {
            config,
            ids,
            cells,
            pixel_map,
            band_map,
            bed: inputs.bed,
            reconciler,
            year: None,
        })
    }

    pub fn config(&self) -> &CouplerConfig {
        &self.config
    }

    pub fn tile_ids(&self) -> TileIds {
        self.ids
    }

    pub fn cells(&self) -> &CellTable {
        &self.cells
    }

    pub fn pixel_map(&self) -> &PixelCellMap {
        &self.pixel_map
    }

    pub fn band_map(&self) -> &BandMap {
        &self.band_map
    }

    pub fn bed(&self) -> &Grid {
        &self.bed
    }

    pub fn reconciler(&self) -> &AreaReconciler {
        &self.reconciler
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn begin_year(&mut self, year: i32) {
        self.year = Some(year);
    }

    /// Mass balance at each pixel's current elevation, on the bed grid's
    /// extent.
    pub fn mass_balance_grid(&self, polys: &PolynomialTable) -> Result<Grid> {
        validate_polynomials(polys, &self.cells)?;
        mass_balance_grid(polys, &self.pixel_map, self.bed.extent)
    }

    /// Take the glacier model's new surface: derive the mask, refresh pixel
    /// elevations and reconcile the tile table against them.
    pub fn ingest_surface(&mut self, surface: &Grid) -> Result<(GlacierMask, ReconcileReport)> {
        let mask = update_glacier_mask(surface, &self.bed)?;
        self.pixel_map.refresh(surface, &mask)?;
        let report = self.reconciler.reconcile(&mut self.cells, &self.pixel_map, &self.band_map)?;

        let unbanded = report.unbanded_pixels();
        if unbanded > 0 {
            warn!(year = ?self.year, unbanded, "pixels outside every band window were left out of the band areas");
        }
        Ok((mask, report))
    }

    pub fn vegetation_text(&self) -> String {
        write_vegetation_table(&self.cells)
    }

    pub fn snow_band_text(&self) -> String {
        write_snow_bands(&self.cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ROOT_PARAMS;
    use crate::error::CouplerError;
    use crate::formats::snow_bands::parse_snow_bands;
    use crate::formats::veg_params::parse_vegetation_table;
    use crate::grid::GridExtent;
    use crate::mass_balance::MassBalancePolynomial;
    use approx::assert_relative_eq;

    /// Cell "1" with two bands (1800s, 1900s) over a 1x4 pixel strip.
    fn inputs() -> RunInputs {
        let vegetation =
            parse_vegetation_table("1 2\n4 0.5 0.1 1 0.1 0 0.1 0 0\n4 0.5 0.1 1 0.1 0 0.1 0 1\n", "vpf").unwrap();
        let snow_bands = parse_snow_bands("1 0.5 0.5 1850 1950 1 1\n", 2, "snb").unwrap();
        let mut pixel_map = PixelCellMap::new(1, 4).unwrap();
        for (col, elev) in [1810.0, 1840.0, 1910.0, 1990.0].into_iter().enumerate() {
            pixel_map.assign(0, col, "1".into(), elev).unwrap();
        }
        RunInputs {
            vegetation,
            snow_bands,
            pixel_map,
            bed: surface([1810.0, 1840.0, 1900.0, 1900.0]),
            glacier_id: Some(22),
        }
    }

    fn surface(elevs: [f64; 4]) -> Grid {
        Grid::from_data(4, 1, GridExtent::default(), elevs.to_vec()).unwrap()
    }

    #[test]
    fn new_sets_pixel_counts_and_band_windows() {
        let ctx = RunContext::new(CouplerConfig::default(), inputs()).unwrap();
        assert_eq!(ctx.cells().get("1").unwrap().pixel_count, 4);
        assert_eq!(ctx.band_map().lower_bounds(0), &[1800, 1900]);
        assert_eq!(ctx.tile_ids(), TileIds { bare_soil: 19, glacier: 22 });
    }

    #[test]
    fn bed_must_match_pixel_map() {
        let mut bad = inputs();
        bad.bed = Grid::from_data(3, 1, GridExtent::default(), vec![0.0; 3]).unwrap();
        assert!(matches!(
            RunContext::new(CouplerConfig::default(), bad),
            Err(CouplerError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn ingest_surface_moves_area_into_glacier_tiles() {
        let mut ctx = RunContext::new(CouplerConfig::default(), inputs()).unwrap();
        assert_eq!(ctx.year(), None);
        ctx.begin_year(2000);
        assert_eq!(ctx.year(), Some(2000));
        // Ice only over the two upper-band pixels.
        let (mask, report) = ctx.ingest_surface(&surface([1810.0, 1840.0, 1910.0, 1990.0])).unwrap();
        assert_eq!(mask.glacier_pixels(), 2);
        assert_eq!(report.unbanded_pixels(), 0);
        assert!(ctx.pixel_map().entry(0, 2).glacier);
        assert!(!ctx.pixel_map().entry(0, 1).glacier);
        assert_eq!(ctx.pixel_map().entry(0, 3).elevation, 1990.0);
        // Residuals stay at the first-year values by default.
        assert_relative_eq!(ctx.reconciler().residuals().get(0, 1), 0.5);

        let band = &ctx.cells().get("1").unwrap().bands[1];
        assert_relative_eq!(band.glacier_fraction, 0.5);
        assert_relative_eq!(band.tile(22).unwrap().area_fraction, 0.5);
        assert_eq!(band.tile(22).unwrap().root_params, DEFAULT_ROOT_PARAMS);
        assert_relative_eq!(band.tile(4).unwrap().area_fraction, 0.0);
        let lower = &ctx.cells().get("1").unwrap().bands[0];
        assert!(lower.tile(22).is_none());
        assert_relative_eq!(lower.tile(4).unwrap().area_fraction, 0.5);
    }

    #[test]
    fn mass_balance_needs_every_cell() {
        let ctx = RunContext::new(CouplerConfig::default(), inputs()).unwrap();
        let mut polys = PolynomialTable::new();
        polys.insert("1".into(), MassBalancePolynomial { c0: 1.0, c1: 0.0, c2: 0.0 });
        assert_eq!(ctx.mass_balance_grid(&polys).unwrap().data, vec![1.0; 4]);
        polys.insert("2".into(), MassBalancePolynomial { c0: 1.0, c1: 0.0, c2: 0.0 });
        assert!(matches!(ctx.mass_balance_grid(&polys), Err(CouplerError::Consistency(_))));
    }
}
