//! coupler-run: drive the hydrology and glacier models year by year,
//! reconciling the hydrology model's vegetation tiles with the glacier
//! extent after each year.

mod external;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use coupler_core::config::{BandCoverage, CouplerConfig, ResidualPolicy};
use coupler_core::formats::global_params::GlobalParams;
use coupler_core::formats::veg_params::read_root_params_file;
use coupler_core::{Coupler, CouplerPaths, RunContext, RunInputs};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use external::ExternalModels;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "coupler-run", about = "Run the coupled hydrology / glacier model")]
struct Args {
    /// Hydrology model global parameter file.
    #[arg(short = 'g', long = "global", alias = "g")]
    global_file: PathBuf,

    /// Glacier model parameter file.
    #[arg(long)]
    rgm_params: PathBuf,

    /// Initial ice surface DEM.
    #[arg(long)]
    sdem: PathBuf,

    /// Bed DEM.
    #[arg(long)]
    bdem: PathBuf,

    /// Pixel to grid cell mapping file.
    #[arg(long)]
    pixel_map: PathBuf,

    /// Hydrology model executable.
    #[arg(long, default_value = "vicNl")]
    hydrology_exe: PathBuf,

    /// Glacier model executable.
    #[arg(long, default_value = "rgm")]
    glacier_exe: PathBuf,

    /// Mass balance polynomial table per year; `{state}` is replaced by the
    /// state file written that year.
    #[arg(long, default_value = "{state}.mb.txt")]
    polynomials: String,

    /// Directory for per-year temporary files.
    #[arg(long, default_value = "temp")]
    work_dir: PathBuf,

    /// JSON coupler config. Flags below override its fields.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Elevation band width in metres.
    #[arg(long)]
    band_size: Option<i64>,

    /// Vegetation class used for bare soil.
    #[arg(long)]
    bare_soil_id: Option<u32>,

    /// Vegetation class used for glacier (default: GLACIER_ID from the global file).
    #[arg(long)]
    glacier_id: Option<u32>,

    /// One-line file of 6 root parameters for inserted bare soil tiles.
    #[arg(long)]
    bare_soil_root: Option<PathBuf>,

    /// One-line file of 6 root parameters for inserted glacier tiles.
    #[arg(long)]
    glacier_root: Option<PathBuf>,

    /// Measure each year's change against the previous year, not the first.
    #[arg(long)]
    roll_forward_residuals: bool,

    /// Abort when a pixel falls outside every band window of its cell.
    #[arg(long)]
    strict_bands: bool,

    /// Keep mass balance grids and write glacier masks for each year.
    #[arg(long)]
    trace_files: bool,

    /// Write the per-year reconciliation reports to this JSON file.
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Args {
    fn coupler_config(&self) -> Result<CouplerConfig> {
        let mut config = match &self.config {
            Some(path) => CouplerConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => CouplerConfig::default(),
        };
        if let Some(v) = self.band_size {
            config.band_size = v;
        }
        if let Some(v) = self.bare_soil_id {
            config.bare_soil_id = v;
        }
        if self.glacier_id.is_some() {
            config.glacier_id = self.glacier_id;
        }
        if let Some(path) = &self.bare_soil_root {
            config.bare_soil_root = read_root_params_file(path)
                .with_context(|| format!("reading bare soil root parameters {}", path.display()))?;
        }
        if let Some(path) = &self.glacier_root {
            config.glacier_root = read_root_params_file(path)
                .with_context(|| format!("reading glacier root parameters {}", path.display()))?;
        }
        if self.roll_forward_residuals {
            config.residual_policy = ResidualPolicy::RollForward;
        }
        if self.strict_bands {
            config.band_coverage = BandCoverage::Strict;
        }
        if self.trace_files {
            config.keep_trace_files = true;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coupler_run=info,coupler_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.coupler_config()?;
    info!(?config, "coupler configuration");

    let globals = GlobalParams::read_file(&args.global_file)
        .with_context(|| format!("reading global parameters {}", args.global_file.display()))?;
    let inputs = RunInputs::load(&globals, &args.pixel_map, &args.bdem).context("loading run inputs")?;
    let context = RunContext::new(config, inputs).context("building run context")?;

    fs::create_dir_all(&args.work_dir)
        .with_context(|| format!("creating work directory {}", args.work_dir.display()))?;

    let models = ExternalModels {
        hydrology_exe: args.hydrology_exe.clone(),
        glacier_exe: args.glacier_exe.clone(),
        glacier_params: args.rgm_params.clone(),
        polynomial_pattern: args.polynomials.clone(),
    };
    let paths = CouplerPaths {
        work_dir: args.work_dir.clone(),
        bed_dem: args.bdem.clone(),
        initial_surface_dem: args.sdem.clone(),
    };
    let mut coupler = Coupler::new(models, context, globals, paths);
    let summaries = coupler.run().context("coupled run failed")?;

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&summaries)?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    }
    info!(years = summaries.len(), "coupled run complete");
    Ok(())
}
