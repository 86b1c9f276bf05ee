//! Flat-file codecs for the hydrology and glacier model inputs/outputs.
//!
//! Every parser takes the file text plus a `source_name` used in error
//! messages, so the same code serves files on disk and in-memory fixtures.
pub mod global_params;
pub mod gsa;
pub mod pixel_map_file;
pub mod polynomials;
pub mod snow_bands;
pub mod veg_params;

use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{CouplerError, Result};

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CouplerError::io(path, e))
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|e| CouplerError::io(path, e))
}

/// Parse one whitespace-separated token, naming `what` on failure.
pub(crate) fn parse_token<T>(token: &str, what: &str, source_name: &str, line: usize) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    token
        .parse()
        .map_err(|e| CouplerError::format(source_name, line, format!("bad {what} `{token}`: {e}")))
}

/// Space-join a run of values.
pub(crate) fn join<T: Display>(values: &[T]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}
