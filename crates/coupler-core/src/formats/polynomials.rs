//! Mass balance polynomial table: `cell_id c0 c1 c2` per line.
use std::path::Path;

use super::{parse_token, read_text};
use crate::error::{CouplerError, Result};
use crate::mass_balance::{MassBalancePolynomial, PolynomialTable};

pub fn parse_polynomial_table(text: &str, source_name: &str) -> Result<PolynomialTable> {
    let mut table = PolynomialTable::new();
    for (i, line) in text.lines().enumerate() {
        let n = i + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [first, ..] if first.starts_with('#') => continue,
            [id, c0, c1, c2] => {
                let poly = MassBalancePolynomial {
                    c0: parse_token(c0, "c0", source_name, n)?,
                    c1: parse_token(c1, "c1", source_name, n)?,
                    c2: parse_token(c2, "c2", source_name, n)?,
                };
                if table.insert(id.to_string(), poly).is_some() {
                    return Err(CouplerError::format(source_name, n, format!("cell {id} listed twice")));
                }
            }
            other => {
                return Err(CouplerError::format(
                    source_name,
                    n,
                    format!("expected `cell_id c0 c1 c2`, found {} fields", other.len()),
                ))
            }
        }
    }
    Ok(table)
}

pub fn read_polynomial_file(path: &Path) -> Result<PolynomialTable> {
    parse_polynomial_table(&read_text(path)?, &path.display().to_string())
}
