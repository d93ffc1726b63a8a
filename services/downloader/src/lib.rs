//! HRRR partial-retrieval pipeline.
//!
//! Finds the latest HRRR run on NOAA's bucket, plans which forecast files to
//! pull across the 18-hour and 48-hour cycles, fetches only the selected
//! GRIB2 messages of each file via its `.idx` sidecar, clips them per region
//! and stitches them into one time-ordered file per region.

pub mod assembler;
pub mod clip;
pub mod config;
pub mod discovery;
pub mod handler;
pub mod plan;
pub mod publish;

pub use assembler::{Assembler, AssemblyConfig, AssemblyReport, GapReason, PlanGap};
pub use clip::{RegionClipper, Wgrib2Clipper};
pub use config::AppConfig;
pub use discovery::{DiscoveredRun, DiscoveryPolicy, RunDiscoverer};
pub use handler::{handle_event, Pipeline, RunOutcome};
pub use plan::{PlanBuilder, PlanEntry, RetrievalPlan};
pub use publish::{Manifest, Publisher};
