//! Area-fraction coupling between a grid-cell hydrology model and a
//! pixel-grid glacier model.
//!
//! Each simulated year the glacier model reports a new ice surface; the
//! coupler turns that into per-band glacier and band area fractions and
//! moves area between the glacier, bare-soil and vegetated tiles of every
//! elevation band so the hydrology model's next year sees the new extent.

pub mod bands;
pub mod config;
pub mod context;
pub mod coupler;
pub mod error;
pub mod formats;
pub mod glacier_mask;
pub mod grid;
pub mod mass_balance;
pub mod pixel_map;
pub mod reconcile;
pub mod tiles;

pub use config::CouplerConfig;
pub use context::{RunContext, RunInputs};
pub use coupler::{Coupler, CouplerPaths, GlacierRun, ModelRunner, YearSummary};
pub use error::{CouplerError, Result};
