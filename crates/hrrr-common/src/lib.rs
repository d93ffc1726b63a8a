//! Common types and utilities shared across the HRRR retrieval crates.

pub mod error;
pub mod range;
pub mod region;
pub mod run;

pub use error::{HrrrError, HrrrResult};
pub use range::ByteRange;
pub use region::{default_regions, GeoPoint, Region, RegionParseError};
pub use run::{day_prefix, run_hour_from_key, surface_file_name, CycleLength, ForecastCycle, ModelRun};
