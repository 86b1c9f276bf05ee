//! The real hydrology and glacier executables behind `ModelRunner`.

use std::path::{Path, PathBuf};
use std::process::Command;

use coupler_core::coupler::{GlacierRun, ModelRunner};
use coupler_core::error::{CouplerError, Result};
use coupler_core::formats::polynomials::read_polynomial_file;
use coupler_core::mass_balance::PolynomialTable;
use tracing::{debug, info};

/// Placeholder in the polynomial path pattern replaced by the state file.
pub const STATE_PLACEHOLDER: &str = "{state}";

/// Name of the surface DEM the glacier model writes for a one-year run.
pub const GLACIER_SURFACE_OUTPUT: &str = "s_out_00001.grd";

#[derive(Debug, Clone)]
pub struct ExternalModels {
    pub hydrology_exe: PathBuf,
    pub glacier_exe: PathBuf,
    pub glacier_params: PathBuf,
    /// Path of the per-year polynomial table, with `{state}` standing for
    /// the state file name.
    pub polynomial_pattern: String,
}

impl ExternalModels {
    pub fn polynomial_path(&self, state_file: &str) -> PathBuf {
        PathBuf::from(self.polynomial_pattern.replace(STATE_PLACEHOLDER, state_file))
    }
}

fn run_checked(model: &str, cmd: &mut Command) -> Result<()> {
    debug!(model, command = ?cmd, "spawning");
    let status = cmd.status().map_err(|e| CouplerError::ExternalModel {
        model: model.to_string(),
        message: format!("could not start {:?}: {e}", cmd.get_program()),
    })?;
    if !status.success() {
        return Err(CouplerError::ExternalModel {
            model: model.to_string(),
            message: format!("exited with {status}"),
        });
    }
    Ok(())
}

impl ModelRunner for ExternalModels {
    fn run_hydrology(&mut self, global_file: &Path) -> Result<()> {
        info!(global_file = %global_file.display(), "invoking hydrology model");
        run_checked("hydrology", Command::new(&self.hydrology_exe).arg("-g").arg(global_file))
    }

    fn mass_balance_polynomials(&mut self, state_file: &str) -> Result<PolynomialTable> {
        read_polynomial_file(&self.polynomial_path(state_file))
    }

    fn run_glacier(&mut self, run: &GlacierRun<'_>) -> Result<PathBuf> {
        info!(year = run.year, mass_balance = %run.mass_balance.display(), "invoking glacier model");
        run_checked(
            "glacier",
            Command::new(&self.glacier_exe)
                .arg("-p")
                .arg(&self.glacier_params)
                .arg("-b")
                .arg(run.bed_dem)
                .arg("-d")
                .arg(run.surface_dem)
                .arg("-m")
                .arg(run.mass_balance)
                .arg("-o")
                .arg(run.output_dir)
                .args(["-s", "0", "-e", "0"]),
        )?;
        Ok(run.output_dir.join(GLACIER_SURFACE_OUTPUT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(hydrology: &str) -> ExternalModels {
        ExternalModels {
            hydrology_exe: hydrology.into(),
            glacier_exe: "rgm".into(),
            glacier_params: "rgm.params".into(),
            polynomial_pattern: "/out/{state}.mb.txt".into(),
        }
    }

    #[test]
    fn polynomial_path_substitutes_state() {
        assert_eq!(
            models("vic").polynomial_path("state_19601231"),
            PathBuf::from("/out/state_19601231.mb.txt")
        );
    }

    #[test]
    fn missing_executable_is_an_external_model_error() {
        let err = models("/nonexistent/hydrology-model").run_hydrology(Path::new("gpf.txt")).unwrap_err();
        assert!(matches!(err, CouplerError::ExternalModel { ref model, .. } if model == "hydrology"));
    }

    #[test]
    fn polynomials_are_read_from_the_pattern_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("s_2000.mb.txt"), "7 1.0 0.5 0.0\n").unwrap();
        let mut m = models("vic");
        m.polynomial_pattern = format!("{}/{{state}}.mb.txt", dir.path().display());
        let polys = m.mass_balance_polynomials("s_2000").unwrap();
        assert_eq!(polys["7"].c1, 0.5);
    }
}
