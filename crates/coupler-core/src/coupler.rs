//! Year loop: alternate the hydrology and glacier models, reconciling the
//! hydrology model's tile table with the glacier surface after each year.
//!
//! All transient files for year `Y` are written to the work directory:
//!   gpf_temp_Y.txt            global parameters for the hydrology run
//!   mass_balance_grid_Y.gsa   glacier model forcing (removed unless traced)
//!   rgm_surf_dem_out_Y.gsa    new ice surface, next year's input surface
//!   glacier_mask_Y.gsa        0/1 glacier mask (trace only)
//!   vpf_temp_Y.txt            reconciled vegetation parameters
//!   snb_temp_Y.txt            reconciled snow bands

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::error::{CouplerError, Result};
use crate::formats::global_params::{CarriedInputs, GlobalParams};
use crate::formats::gsa::{read_gsa_file, write_gsa_file};
use crate::formats::write_text;
use crate::mass_balance::PolynomialTable;
use crate::reconcile::ReconcileReport;

// ── External models ───────────────────────────────────────────────────────────

/// Arguments for one glacier model year.
#[derive(Debug, Clone, Copy)]
pub struct GlacierRun<'a> {
    pub year: i32,
    pub bed_dem: &'a Path,
    pub surface_dem: &'a Path,
    pub mass_balance: &'a Path,
    pub output_dir: &'a Path,
}

/// The two simulation models the coupler drives.
pub trait ModelRunner {
    /// Run the hydrology model for the year configured in `global_file`.
    fn run_hydrology(&mut self, global_file: &Path) -> Result<()>;

    /// Per-cell mass balance polynomials stored in the state the hydrology
    /// model wrote at the end of the year.
    fn mass_balance_polynomials(&mut self, state_file: &str) -> Result<PolynomialTable>;

    /// Run the glacier model for one year and return the path of the
    /// surface DEM it produced.
    fn run_glacier(&mut self, run: &GlacierRun<'_>) -> Result<PathBuf>;
}

// ── Driver ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CouplerPaths {
    pub work_dir: PathBuf,
    pub bed_dem: PathBuf,
    pub initial_surface_dem: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSummary {
    pub year: i32,
    pub glacier_pixels: usize,
    pub vegetation_file: PathBuf,
    pub snow_band_file: PathBuf,
    pub report: ReconcileReport,
}

pub struct Coupler<R: ModelRunner> {
    runner: R,
    context: RunContext,
    globals: GlobalParams,
    paths: CouplerPaths,
    surface_dem: PathBuf,
    carried: Option<CarriedInputs>,
}

impl<R: ModelRunner> Coupler<R> {
    pub fn new(runner: R, context: RunContext, globals: GlobalParams, paths: CouplerPaths) -> Self {
        let surface_dem = paths.initial_surface_dem.clone();
        Self { runner, context, globals, paths, surface_dem, carried: None }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run every year from `STARTYEAR` up to, not including, `ENDYEAR`.
    pub fn run(&mut self) -> Result<Vec<YearSummary>> {
        let start = self.globals.start_year()?;
        let end = self.globals.end_year()?;
        info!(start, end, work_dir = %self.paths.work_dir.display(), "starting coupled run");
        (start..end).map(|year| self.run_year(year)).collect()
    }

    fn work_file(&self, stem: &str, year: i32, ext: &str) -> PathBuf {
        self.paths.work_dir.join(format!("{stem}_{year}.{ext}"))
    }

    pub fn run_year(&mut self, year: i32) -> Result<YearSummary> {
        info!(year, "running year");
        self.context.begin_year(year);
        let keep_trace = self.context.config().keep_trace_files;

        // Hydrology.
        self.globals.update_for_year(year, self.carried.as_ref())?;
        let global_file = self.work_file("gpf_temp", year, "txt");
        write_text(&global_file, &self.globals.to_text())?;
        self.runner.run_hydrology(&global_file)?;

        // Mass balance forcing.
        let state_file = self.globals.state_file(year)?;
        debug!(year, state_file = %state_file, "reading mass balance polynomials");
        let polys = self.runner.mass_balance_polynomials(&state_file)?;
        let mass_balance = self.context.mass_balance_grid(&polys)?;
        let mbg_file = self.work_file("mass_balance_grid", year, "gsa");
        write_gsa_file(&mbg_file, &mass_balance)?;

        // Glacier.
        let produced = self.runner.run_glacier(&GlacierRun {
            year,
            bed_dem: &self.paths.bed_dem,
            surface_dem: &self.surface_dem,
            mass_balance: &mbg_file,
            output_dir: &self.paths.work_dir,
        })?;
        let surface = read_gsa_file(&produced)?;
        let surface_file = self.work_file("rgm_surf_dem_out", year, "gsa");
        if produced != surface_file {
            fs::rename(&produced, &surface_file).map_err(|e| CouplerError::io(&produced, e))?;
        }
        self.surface_dem = surface_file;
        if !keep_trace {
            fs::remove_file(&mbg_file).map_err(|e| CouplerError::io(&mbg_file, e))?;
        }

        // Reconciliation.
        let (mask, report) = self.context.ingest_surface(&surface)?;
        if keep_trace {
            let mask_file = self.work_file("glacier_mask", year, "gsa");
            write_gsa_file(&mask_file, &mask.to_grid(self.context.bed().extent))?;
        }
        let vegetation_file = self.work_file("vpf_temp", year, "txt");
        write_text(&vegetation_file, &self.context.vegetation_text())?;
        let snow_band_file = self.work_file("snb_temp", year, "txt");
        write_text(&snow_band_file, &self.context.snow_band_text())?;

        info!(year, glacier_pixels = mask.glacier_pixels(), "year complete");
        self.carried = Some(CarriedInputs {
            init_state: state_file,
            veg_param: vegetation_file.clone(),
            snow_band: snow_band_file.clone(),
        });
        Ok(YearSummary {
            year,
            glacier_pixels: mask.glacier_pixels(),
            vegetation_file,
            snow_band_file,
            report,
        })
    }
}
