use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CouplerError, Result};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Elevation band width in metres.
pub const DEFAULT_BAND_SIZE: i64 = 100;
/// Vegetation class reserved for bare soil.
pub const DEFAULT_BARE_SOIL_ID: u32 = 19;
/// Root parameters given to inserted bare-soil and glacier tiles.
pub const DEFAULT_ROOT_PARAMS: RootParams = RootParams([0.10, 1.00, 0.10, 0.00, 0.10, 0.00]);

/// The six root zone parameters of a vegetation tile
/// (depth/fraction pairs for three root zones).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootParams(pub [f64; 6]);

impl Default for RootParams {
    fn default() -> Self {
        DEFAULT_ROOT_PARAMS
    }
}

/// Which residual fraction the next year's delta is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResidualPolicy {
    /// Every year compares against the residual computed at start-up.
    #[default]
    Initial,
    /// Each year's new residual becomes the next year's baseline.
    RollForward,
}

/// What to do with a pixel whose elevation misses every band window of its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandCoverage {
    /// Drop the pixel from that year's band tallies.
    #[default]
    Lenient,
    /// Abort the run.
    Strict,
}

/// Run-wide settings for the coupler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouplerConfig {
    /// Elevation band width in metres, default 100.
    pub band_size: i64,
    /// Vegetation class id of bare soil, default 19.
    pub bare_soil_id: u32,
    /// Vegetation class id of glacier. `None` defers to the `GLACIER_ID`
    /// entry of the global parameter file.
    pub glacier_id: Option<u32>,
    pub bare_soil_root: RootParams,
    pub glacier_root: RootParams,
    pub residual_policy: ResidualPolicy,
    pub band_coverage: BandCoverage,
    /// Keep per-year mass balance and glacier mask grids on disk.
    pub keep_trace_files: bool,
}

impl Default for CouplerConfig {
    fn default() -> Self {
        Self {
            band_size: DEFAULT_BAND_SIZE,
            bare_soil_id: DEFAULT_BARE_SOIL_ID,
            glacier_id: None,
            bare_soil_root: DEFAULT_ROOT_PARAMS,
            glacier_root: DEFAULT_ROOT_PARAMS,
            residual_policy: ResidualPolicy::Initial,
            band_coverage: BandCoverage::Lenient,
            keep_trace_files: false,
        }
    }
}

/// The two reserved vegetation classes, resolved for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileIds {
    pub bare_soil: u32,
    pub glacier: u32,
}

impl CouplerConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CouplerError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| CouplerError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        if self.band_size <= 0 {
            return Err(CouplerError::Config(format!(
                "band_size must be positive, got {}",
                self.band_size
            )));
        }
        if self.glacier_id == Some(self.bare_soil_id) {
            return Err(CouplerError::Config(format!(
                "bare soil and glacier share vegetation id {}",
                self.bare_soil_id
            )));
        }
        Ok(())
    }

    /// Resolve the reserved tile ids, using `fallback_glacier_id` when the
    /// config leaves the glacier id unset.
    pub fn tile_ids(&self, fallback_glacier_id: Option<u32>) -> Result<TileIds> {
        let glacier = self.glacier_id.or(fallback_glacier_id).ok_or_else(|| {
            CouplerError::Config("no glacier vegetation id configured".to_string())
        })?;
        if glacier == self.bare_soil_id {
            return Err(CouplerError::Config(format!(
                "bare soil and glacier share vegetation id {glacier}"
            )));
        }
        Ok(TileIds { bare_soil: self.bare_soil_id, glacier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = CouplerConfig::default();
        assert_eq!(cfg.band_size, 100);
        assert_eq!(cfg.bare_soil_id, 19);
        assert_eq!(cfg.residual_policy, ResidualPolicy::Initial);
        assert_eq!(cfg.band_coverage, BandCoverage::Lenient);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: CouplerConfig =
            serde_json::from_str(r#"{"band_size": 50, "residual_policy": "roll-forward"}"#).unwrap();
        assert_eq!(cfg.band_size, 50);
        assert_eq!(cfg.residual_policy, ResidualPolicy::RollForward);
        assert_eq!(cfg.bare_soil_root, DEFAULT_ROOT_PARAMS);
    }

    #[test]
    fn rejects_non_positive_band_size() {
        let cfg = CouplerConfig { band_size: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(CouplerError::Config(_))));
    }

    #[test]
    fn glacier_id_falls_back_to_global_file() {
        let cfg = CouplerConfig::default();
        assert_eq!(cfg.tile_ids(Some(22)).unwrap(), TileIds { bare_soil: 19, glacier: 22 });
        assert!(cfg.tile_ids(None).is_err());
        assert!(cfg.tile_ids(Some(19)).is_err());
    }
}
