//! Model runs, forecast cycles and HRRR object naming.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Domain directory published under each HRRR day.
pub const CONUS_DOMAIN: &str = "conus";

/// Identifies one published model execution.
///
/// Combines the calendar day of the run directory with the run hour (00Z..23Z).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRun {
    pub date: NaiveDate,
    pub run_hour: u32,
}

impl ModelRun {
    pub fn new(date: NaiveDate, run_hour: u32) -> Self {
        Self { date, run_hour }
    }

    /// Start time of the run.
    pub fn reference_time(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.date.and_hms_opt(0, 0, 0).unwrap_or_default())
            + Duration::hours(self.run_hour as i64)
    }

    /// Object key of one surface forecast file of this run.
    pub fn surface_key(&self, forecast_hour: u32) -> String {
        format!(
            "{}/{}",
            day_prefix(self.date),
            surface_file_name(self.run_hour, forecast_hour)
        )
    }
}

/// Directory key for one day of HRRR output: "hrrr.YYYYMMDD/conus"
pub fn day_prefix(date: NaiveDate) -> String {
    format!("hrrr.{}/{}", date.format("%Y%m%d"), CONUS_DOMAIN)
}

/// Surface forecast file name: "hrrr.tHHz.wrfsfcfFF.grib2"
pub fn surface_file_name(run_hour: u32, forecast_hour: u32) -> String {
    format!("hrrr.t{:02}z.wrfsfcf{:02}.grib2", run_hour, forecast_hour)
}

/// Extract the run hour from an HRRR object key.
///
/// Example: "hrrr.20240115/conus/hrrr.t18z.wrfsfcf48.grib2" -> Some(18)
pub fn run_hour_from_key(key: &str) -> Option<u32> {
    let filename = key.rsplit('/').next()?;
    let token = filename.split('.').find(|t| t.starts_with('t') && t.ends_with('z'))?;
    let hour: u32 = token.get(1..token.len() - 1)?.parse().ok()?;
    (hour < 24).then_some(hour)
}

/// Maximum forecast horizon published by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CycleLength {
    /// Hourly runs, 18 forecast hours
    Short18,
    /// Synoptic runs (00/06/12/18Z), 48 forecast hours
    Long48,
}

impl CycleLength {
    pub fn max_forecast_hour(&self) -> u32 {
        match self {
            CycleLength::Short18 => 18,
            CycleLength::Long48 => 48,
        }
    }

    /// Marker that identifies the cycle's final forecast file in a key.
    pub fn default_marker(&self) -> &'static str {
        match self {
            CycleLength::Short18 => "f18",
            CycleLength::Long48 => "f48",
        }
    }
}

/// One of the two relevant cycles for a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastCycle {
    pub length: CycleLength,
    pub run_hour: u32,
}

impl ForecastCycle {
    pub fn new(length: CycleLength, run_hour: u32) -> Self {
        Self { length, run_hour }
    }
}
