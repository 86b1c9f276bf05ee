//! Global run-configuration file of the hydrology model.
//!
//! An insertion-ordered list of `NAME value...` lines. Most names appear
//! once; a few repeat (`OUTFILE` numbered per occurrence, `OUTVAR` grouped
//! under the latest `OUTFILE`) and must be written back in the same shape.
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::read_text;
use crate::error::{CouplerError, Result};

const OUTFILE: &str = "OUTFILE";
const OUTVAR: &str = "OUTVAR";
const INIT_STATE: &str = "INIT_STATE";
/// `INIT_STATE` is reserved immediately after this entry.
const OUTPUT_FORCE: &str = "OUTPUT_FORCE";

/// Inputs produced by the previous year that the next hydrology run must
/// start from.
#[derive(Debug, Clone, PartialEq)]
pub struct CarriedInputs {
    pub init_state: String,
    pub veg_param: PathBuf,
    pub snow_band: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlobalParams {
    entries: IndexMap<String, Vec<Vec<String>>>,
}

impl GlobalParams {
    pub fn parse(text: &str) -> Self {
        let mut entries: IndexMap<String, Vec<Vec<String>>> = IndexMap::new();
        let mut outfiles = 0usize;

        for line in text.lines() {
            if line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let Some(name) = tokens.next() else { continue };
            let values: Vec<String> = tokens.map(str::to_string).collect();

            let key = match name {
                OUTFILE => {
                    outfiles += 1;
                    format!("{OUTFILE}_{outfiles}")
                }
                OUTVAR => format!("{OUTVAR}_{outfiles}"),
                other => other.to_string(),
            };
            entries.entry(key).or_default().push(values);

            if name == OUTPUT_FORCE {
                entries.entry(INIT_STATE.to_string()).or_default();
            }
        }
        Self { entries }
    }

    pub fn read_file(path: &Path) -> Result<Self> {
        Ok(Self::parse(&read_text(path)?))
    }

    pub fn get(&self, name: &str) -> Option<&[Vec<String>]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// `i`-th value of the first line of `name`.
    fn value(&self, name: &str, i: usize) -> Result<&str> {
        self.entries
            .get(name)
            .and_then(|lines| lines.first())
            .and_then(|values| values.get(i))
            .map(String::as_str)
            .ok_or_else(|| CouplerError::Config(format!("global parameter {name} is missing value {}", i + 1)))
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str, i: usize) -> Result<T> {
        let raw = self.value(name, i)?;
        raw.parse()
            .map_err(|_| CouplerError::Config(format!("global parameter {name} has unreadable value `{raw}`")))
    }

    pub fn start_year(&self) -> Result<i32> {
        self.parsed("STARTYEAR", 0)
    }

    pub fn end_year(&self) -> Result<i32> {
        self.parsed("ENDYEAR", 0)
    }

    pub fn state_name(&self) -> Result<&str> {
        self.value("STATENAME", 0)
    }

    pub fn state_month(&self) -> Result<&str> {
        self.value("STATEMONTH", 0)
    }

    pub fn state_day(&self) -> Result<&str> {
        self.value("STATEDAY", 0)
    }

    /// `GLACIER_ID` when the file declares one.
    pub fn glacier_id(&self) -> Result<Option<u32>> {
        if self.entries.contains_key("GLACIER_ID") {
            self.parsed("GLACIER_ID", 0).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn veg_param(&self) -> Result<PathBuf> {
        self.value("VEGPARAM", 0).map(PathBuf::from)
    }

    pub fn snow_band_count(&self) -> Result<usize> {
        self.parsed("SNOW_BAND", 0)
    }

    pub fn snow_band_file(&self) -> Result<PathBuf> {
        self.value("SNOW_BAND", 1).map(PathBuf::from)
    }

    /// Model state written at the end of `year`: `STATENAME_{year}{month}{day}`.
    pub fn state_file(&self, year: i32) -> Result<String> {
        Ok(format!(
            "{}_{year}{}{}",
            self.state_name()?,
            self.state_month()?,
            self.state_day()?
        ))
    }

    /// Replace all lines of `name` with a single line, keeping its position
    /// or appending it if absent.
    pub fn set(&mut self, name: &str, values: Vec<String>) {
        self.entries.insert(name.to_string(), vec![values]);
    }

    /// Restrict the run to a single year and, after the first year, point the
    /// model at the state and parameter files the previous year produced.
    pub fn update_for_year(&mut self, year: i32, carried: Option<&CarriedInputs>) -> Result<()> {
        let y = year.to_string();
        self.set("STARTYEAR", vec![y.clone()]);
        self.set("ENDYEAR", vec![y.clone()]);
        self.set("STATEYEAR", vec![y]);
        if let Some(carried) = carried {
            let bands = self.snow_band_count()?;
            self.set(INIT_STATE, vec![carried.init_state.clone()]);
            self.set("VEGPARAM", vec![carried.veg_param.display().to_string()]);
            self.set(
                "SNOW_BAND",
                vec![bands.to_string(), carried.snow_band.display().to_string()],
            );
        }
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (key, lines) in &self.entries {
            let name = if key.starts_with("OUTFILE_") {
                OUTFILE
            } else if key.starts_with("OUTVAR_") {
                OUTVAR
            } else {
                key.as_str()
            };
            let lines = if name == OUTFILE { &lines[..lines.len().min(1)] } else { &lines[..] };
            for values in lines {
                out.push_str(name);
                for v in values {
                    out.push(' ');
                    out.push_str(v);
                }
                out.push('\n');
            }
        }
        out
    }
}
