//! Area-fraction reconciliation between the pixel grid and the
//! cell/band/tile table.
//!
//! Pipeline per year:
//!   1. Tally band and glacier pixels per cell-band.
//!   2. Convert tallies to fractions of each cell's pixel count.
//!   3. Move area between glacier and non-glacier tiles of every band so the
//!      tile table follows the new glacier extent.
pub mod aggregate;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::bands::BandMap;
use crate::config::{BandCoverage, CouplerConfig, ResidualPolicy, RootParams, TileIds};
use crate::error::{CouplerError, Result};
use crate::pixel_map::PixelCellMap;
use crate::tiles::{CellId, CellTable, ElevationBand};
use aggregate::{aggregate, BandTally};

// ── Rules ─────────────────────────────────────────────────────────────────────

/// Everything the reconciler needs to know about reserved tiles and policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileRules {
    pub ids: TileIds,
    pub bare_soil_root: RootParams,
    pub glacier_root: RootParams,
    pub residual_policy: ResidualPolicy,
    pub band_coverage: BandCoverage,
}

impl ReconcileRules {
    pub fn from_config(config: &CouplerConfig, ids: TileIds) -> Self {
        Self {
            ids,
            bare_soil_root: config.bare_soil_root,
            glacier_root: config.glacier_root,
            residual_policy: config.residual_policy,
            band_coverage: config.band_coverage,
        }
    }
}

// ── Fractions ─────────────────────────────────────────────────────────────────

/// Band and glacier area fractions of one cell, by band index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellFractions {
    pub band: Vec<f64>,
    pub glacier: Vec<f64>,
}

/// Divide each cell-band tally by its cell's pixel count.
pub fn compute_fractions(tally: &BandTally, cells: &CellTable) -> Result<Vec<CellFractions>> {
    let mut out = Vec::with_capacity(cells.len());
    for (slot, cell) in cells.iter().enumerate() {
        if cell.pixel_count == 0 {
            return Err(CouplerError::Consistency(format!(
                "cell {} has no pixels in the pixel map",
                cell.id
            )));
        }
        let denom = cell.pixel_count as f64;
        let mut band = Vec::with_capacity(cell.bands.len());
        let mut glacier = Vec::with_capacity(cell.bands.len());
        for i in 0..cell.bands.len() {
            let fb = tally.band_pixels[slot][i] as f64 / denom;
            let fg = tally.glacier_pixels[slot][i] as f64 / denom;
            if fb < 0.0 {
                return Err(CouplerError::conservation(&cell.id, i, "band area fraction", fb));
            }
            if fg < 0.0 {
                return Err(CouplerError::conservation(&cell.id, i, "glacier area fraction", fg));
            }
            band.push(fb);
            glacier.push(fg);
        }
        out.push(CellFractions { band, glacier });
    }
    Ok(out)
}

// ── Residual fractions ────────────────────────────────────────────────────────

/// Non-glacier share of every cell-band, by cell slot and band index.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualFractions {
    values: Vec<Vec<f64>>,
}

impl ResidualFractions {
    /// Band area fraction minus the glacier tile's fraction, or the whole
    /// band fraction where the band has no glacier tile.
    pub fn initial(cells: &CellTable, glacier_id: u32) -> Result<Self> {
        let mut values = Vec::with_capacity(cells.len());
        for cell in cells.iter() {
            let mut per_band = Vec::with_capacity(cell.bands.len());
            for band in &cell.bands {
                let residual = match band.tile(glacier_id) {
                    Some(g) => band.area_fraction - g.area_fraction,
                    None => band.area_fraction,
                };
                if residual < 0.0 {
                    return Err(CouplerError::conservation(
                        &cell.id,
                        band.index,
                        "initial residual area fraction (band fraction minus glacier tile)",
                        residual,
                    ));
                }
                per_band.push(residual);
            }
            values.push(per_band);
        }
        Ok(Self { values })
    }

    pub fn get(&self, slot: usize, band: usize) -> f64 {
        self.values[slot][band]
    }

    fn set(&mut self, slot: usize, band: usize, value: f64) {
        self.values[slot][band] = value;
    }
}

// ── Per-band reconciliation ───────────────────────────────────────────────────

/// What happened to a band's tiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum BandAction {
    Unchanged,
    /// Band holds no pixels any more; all tiles zeroed.
    Extinguished,
    /// Glacier retreated; bare soil gained `delta`.
    Shrunk { delta: f64 },
    /// Glacier advanced; non-glacier tiles lost `delta` in proportion.
    Grew { delta: f64 },
}

/// Adjust one band's tiles to the new band and glacier fractions.
///
/// `prior_residual` is the non-glacier fraction the change is measured
/// against. Any tile driven below zero aborts with a conservation error.
pub fn reconcile_band(
    cell_id: &str,
    band: &mut ElevationBand,
    area_frac_band: f64,
    area_frac_glacier: f64,
    prior_residual: f64,
    rules: &ReconcileRules,
) -> Result<BandAction> {
    let index = band.index;
    let glacier_id = rules.ids.glacier;

    if area_frac_band == 0.0 {
        for (_, fraction) in band.fractions_mut() {
            *fraction = 0.0;
        }
        return Ok(BandAction::Extinguished);
    }
    if area_frac_glacier < 0.0 {
        return Err(CouplerError::conservation(cell_id, index, "glacier area fraction", area_frac_glacier));
    }

    let delta = prior_residual - (area_frac_band - area_frac_glacier);

    if delta < 0.0 {
        band.get_or_insert_tile(rules.ids.bare_soil, rules.bare_soil_root).area_fraction += delta.abs();
        match band.tile_mut(glacier_id) {
            Some(glacier) => glacier.area_fraction = area_frac_glacier,
            None if area_frac_glacier > 0.0 => {
                band.get_or_insert_tile(glacier_id, rules.glacier_root).area_fraction = area_frac_glacier;
            }
            None => {}
        }
        Ok(BandAction::Shrunk { delta: delta.abs() })
    } else if delta > 0.0 {
        let displaced = band.non_glacier_fraction(glacier_id);
        if displaced > 0.0 {
            for (class, fraction) in band.fractions_mut() {
                if class == glacier_id {
                    continue;
                }
                let updated = *fraction - delta * (*fraction / displaced);
                if updated < 0.0 {
                    return Err(CouplerError::conservation(
                        cell_id,
                        index,
                        format!("area fraction of vegetation class {class}"),
                        updated,
                    ));
                }
                *fraction = updated;
            }
        }
        band.get_or_insert_tile(glacier_id, rules.glacier_root).area_fraction = area_frac_glacier;
        Ok(BandAction::Grew { delta })
    } else {
        Ok(BandAction::Unchanged)
    }
}

// ── Reconciler ────────────────────────────────────────────────────────────────

/// Per-cell outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellReport {
    pub pixel_count: usize,
    pub band_pixels: Vec<u64>,
    pub glacier_pixels: Vec<u64>,
    pub unbanded_pixels: u64,
    pub fractions: CellFractions,
    pub actions: Vec<BandAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub cells: IndexMap<CellId, CellReport>,
}

impl ReconcileReport {
    pub fn unbanded_pixels(&self) -> u64 {
        self.cells.values().map(|c| c.unbanded_pixels).sum()
    }
}

/// Owns the residual-fraction state carried between years.
#[derive(Debug, Clone)]
pub struct AreaReconciler {
    rules: ReconcileRules,
    residuals: ResidualFractions,
}

impl AreaReconciler {
    pub fn new(rules: ReconcileRules, cells: &CellTable) -> Result<Self> {
        let residuals = ResidualFractions::initial(cells, rules.ids.glacier)?;
        Ok(Self { rules, residuals })
    }

    pub fn rules(&self) -> &ReconcileRules {
        &self.rules
    }

    pub fn residuals(&self) -> &ResidualFractions {
        &self.residuals
    }

    /// Run one full pass: tally, fractions, tile updates. Band area and
    /// glacier fractions on `cells` are replaced by this year's values.
    pub fn reconcile(
        &mut self,
        cells: &mut CellTable,
        pixel_map: &PixelCellMap,
        band_map: &BandMap,
    ) -> Result<ReconcileReport> {
        let tally = aggregate(pixel_map, cells, band_map, self.rules.band_coverage)?;
        let fractions = compute_fractions(&tally, cells)?;

        let mut report = ReconcileReport::default();
        for (slot, (cell, fracs)) in cells.iter_mut().zip(fractions).enumerate() {
            let mut actions = Vec::with_capacity(cell.bands.len());
            for band in cell.bands.iter_mut() {
                let i = band.index;
                let prior = self.residuals.get(slot, i);
                let action = reconcile_band(&cell.id, band, fracs.band[i], fracs.glacier[i], prior, &self.rules)?;
                debug!(cell = %cell.id, band = i, ?action, "reconciled band");

                band.area_fraction = fracs.band[i];
                band.glacier_fraction = fracs.glacier[i];
                if self.rules.residual_policy == ResidualPolicy::RollForward {
                    self.residuals.set(slot, i, fracs.band[i] - fracs.glacier[i]);
                }
                actions.push(action);
            }

            report.cells.insert(
                cell.id.clone(),
                CellReport {
                    pixel_count: cell.pixel_count,
                    band_pixels: tally.band_pixels[slot].clone(),
                    glacier_pixels: tally.glacier_pixels[slot].clone(),
                    unbanded_pixels: tally.unbanded_pixels[slot],
                    fractions: fracs,
                    actions,
                },
            );
        }
        Ok(report)
    }
}
