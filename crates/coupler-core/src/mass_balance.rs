//! Glacier mass balance from per-cell polynomials, rasterised onto the
//! glacier model's pixel grid.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CouplerError, Result};
use crate::grid::{Grid, GridExtent};
use crate::pixel_map::PixelCellMap;
use crate::tiles::{CellId, CellTable};

/// Mass balance as a quadratic in elevation: `c0 + z·(c1 + z·c2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassBalancePolynomial {
    pub c0: f64,
    pub c1: f64,
    pub c2: f64,
}

impl MassBalancePolynomial {
    #[inline]
    pub fn evaluate(&self, elevation: f64) -> f64 {
        self.c0 + elevation * (self.c1 + elevation * self.c2)
    }
}

pub type PolynomialTable = IndexMap<CellId, MassBalancePolynomial>;

/// The polynomial set must cover exactly the cells of the run.
pub fn validate_polynomials(polys: &PolynomialTable, cells: &CellTable) -> Result<()> {
    if polys.len() != cells.len() {
        return Err(CouplerError::Consistency(format!(
            "{} mass balance polynomials for {} cells",
            polys.len(),
            cells.len()
        )));
    }
    if let Some(id) = polys.keys().find(|id| !cells.contains(id)) {
        return Err(CouplerError::UnknownCell {
            cell: id.clone(),
            context: "mass balance polynomial for a cell absent from the vegetation table".into(),
        });
    }
    Ok(())
}

/// Evaluate each assigned pixel's cell polynomial at the pixel's current
/// elevation. Unassigned pixels get 0.
pub fn mass_balance_grid(
    polys: &PolynomialTable,
    pixel_map: &PixelCellMap,
    extent: GridExtent,
) -> Result<Grid> {
    let mut data = Vec::with_capacity(pixel_map.entries().len());
    for (i, entry) in pixel_map.entries().iter().enumerate() {
        let value = match &entry.cell {
            None => 0.0,
            Some(cell) => {
                let poly = polys.get(cell).ok_or_else(|| CouplerError::UnknownCell {
                    cell: cell.clone(),
                    context: format!(
                        "no mass balance polynomial for pixel at row {}, column {}",
                        i / pixel_map.cols(),
                        i % pixel_map.cols()
                    ),
                })?;
                poly.evaluate(entry.elevation)
            }
        };
        data.push(value);
    }
    Grid::from_data(pixel_map.cols(), pixel_map.rows(), extent, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn evaluates_horner_form() {
        let p = MassBalancePolynomial { c0: -2.0, c1: 0.001, c2: 1e-6 };
        assert_relative_eq!(p.evaluate(2000.0), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn grid_uses_pixel_cell_and_zero_elsewhere() {
        let mut map = PixelCellMap::new(1, 3).unwrap();
        map.assign(0, 0, "a".into(), 100.0).unwrap();
        map.assign(0, 2, "b".into(), 200.0).unwrap();
        let mut polys = PolynomialTable::new();
        polys.insert("a".into(), MassBalancePolynomial { c0: 1.0, c1: 0.0, c2: 0.0 });
        polys.insert("b".into(), MassBalancePolynomial { c0: 0.0, c1: 0.5, c2: 0.0 });
        let g = mass_balance_grid(&polys, &map, GridExtent::default()).unwrap();
        assert_eq!(g.data, vec![1.0, 0.0, 100.0]);
    }

    #[test]
    fn missing_polynomial_is_fatal() {
        let mut map = PixelCellMap::new(1, 1).unwrap();
        map.assign(0, 0, "a".into(), 100.0).unwrap();
        let err = mass_balance_grid(&PolynomialTable::new(), &map, GridExtent::default()).unwrap_err();
        assert!(matches!(err, CouplerError::UnknownCell { ref cell, .. } if cell == "a"));
    }
}
