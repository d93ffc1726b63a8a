//! Discovery of the most recent published HRRR run.
//!
//! Walks back from "now" one step at a time until a day directory with data
//! is found, then picks the latest 48-hour and 18-hour cycles of that day.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use hrrr_common::{day_prefix, run_hour_from_key, CycleLength, ForecastCycle, HrrrError, HrrrResult, ModelRun};
use storage::ObjectStorage;

/// Bounded lookback policy for finding a day with published output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryPolicy {
    /// Number of days probed before giving up
    pub max_attempts: u32,
    /// Days to step back after an empty probe
    pub step_days: u32,
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 7,
            step_days: 1,
        }
    }
}

/// Substrings that identify the files of interest in a day listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleMarkers {
    /// Product marker (surface forecast files)
    pub product: String,
    /// Final forecast file of the 48-hour cycle
    pub long: String,
    /// Final forecast file of the 18-hour cycle
    pub short: String,
}

impl Default for CycleMarkers {
    fn default() -> Self {
        Self {
            product: "wrfsfc".to_string(),
            long: CycleLength::Long48.default_marker().to_string(),
            short: CycleLength::Short18.default_marker().to_string(),
        }
    }
}

/// Result of a successful discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscoveredRun {
    /// Day directory that holds both cycles
    pub day: NaiveDate,
    pub long: ForecastCycle,
    pub short: Option<ForecastCycle>,
    /// Hours elapsed between 00Z of `day` and the discovery time
    pub current_hour: i64,
}

impl DiscoveredRun {
    pub fn long_run(&self) -> ModelRun {
        ModelRun::new(self.day, self.long.run_hour)
    }

    pub fn short_run(&self) -> Option<ModelRun> {
        self.short.map(|c| ModelRun::new(self.day, c.run_hour))
    }
}

/// Finds the most recent model run on the source bucket.
pub struct RunDiscoverer<'a> {
    storage: &'a ObjectStorage,
    policy: DiscoveryPolicy,
    markers: CycleMarkers,
}

impl<'a> RunDiscoverer<'a> {
    pub fn new(storage: &'a ObjectStorage, policy: DiscoveryPolicy, markers: CycleMarkers) -> Self {
        Self {
            storage,
            policy,
            markers,
        }
    }

    /// Discover the latest day with data and its cycles, as seen at `now`.
    #[instrument(skip(self), fields(bucket = %self.storage.bucket()))]
    pub async fn discover(&self, now: DateTime<Utc>) -> HrrrResult<DiscoveredRun> {
        let day = self.find_day(now).await?;
        let (long, short) = self.select_cycles(day).await?;

        let midnight = day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        let current_hour = (now - midnight).num_hours();

        Ok(DiscoveredRun {
            day,
            long,
            short,
            current_hour,
        })
    }

    /// Probe day directories backwards from `now` until one holds objects.
    pub async fn find_day(&self, now: DateTime<Utc>) -> HrrrResult<NaiveDate> {
        let mut day = now.date_naive();
        let step = Duration::days(self.policy.step_days.max(1) as i64);

        for attempt in 1..=self.policy.max_attempts {
            let prefix = day_prefix(day);
            info!(prefix = %prefix, attempt = attempt, "Checking for model output");

            if self.storage.has_objects(&prefix).await? {
                info!(prefix = %prefix, "Found the most recent HRRR day");
                return Ok(day);
            }

            debug!(prefix = %prefix, "No objects, stepping back");
            day = day - step;
        }

        warn!(
            attempts = self.policy.max_attempts,
            "No HRRR output found within the lookback window"
        );
        Err(HrrrError::DiscoveryExhausted {
            attempts: self.policy.max_attempts,
        })
    }

    /// Pick the latest long and short cycle published on `day`.
    pub async fn select_cycles(
        &self,
        day: NaiveDate,
    ) -> HrrrResult<(ForecastCycle, Option<ForecastCycle>)> {
        let prefix = day_prefix(day);
        let keys = self.storage.list(&prefix).await?;

        let long = latest_cycle_hour(&keys, &self.markers.product, &self.markers.long)
            .map(|hour| ForecastCycle::new(CycleLength::Long48, hour))
            .ok_or_else(|| {
                HrrrError::CycleNotFound(format!("no {} file under {}", self.markers.long, prefix))
            })?;
        info!(run_hour = long.run_hour, "Latest 48-hour cycle");

        let short = latest_cycle_hour(&keys, &self.markers.product, &self.markers.short)
            .map(|hour| ForecastCycle::new(CycleLength::Short18, hour));
        match short {
            Some(cycle) => info!(run_hour = cycle.run_hour, "Latest 18-hour cycle"),
            None => warn!(prefix = %prefix, "No 18-hour cycle published, using the 48-hour cycle alone"),
        }

        Ok((long, short))
    }
}

/// Run hour of the lexicographically greatest key whose file name contains
/// both the product marker and the cycle marker.
pub fn latest_cycle_hour(keys: &[String], product: &str, marker: &str) -> Option<u32> {
    keys.iter()
        .filter(|key| {
            let filename = key.rsplit('/').next().unwrap_or(key);
            filename.contains(product) && filename.contains(marker)
        })
        .max()
        .and_then(|key| run_hour_from_key(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|n| format!("hrrr.20240115/conus/{}", n))
            .collect()
    }

    #[test]
    fn test_latest_cycle_hour_picks_greatest() {
        let listing = keys(&[
            "hrrr.t06z.wrfsfcf48.grib2",
            "hrrr.t12z.wrfsfcf48.grib2",
            "hrrr.t12z.wrfsfcf48.grib2.idx",
            "hrrr.t18z.wrfsfcf18.grib2",
            "hrrr.t19z.wrfsfcf17.grib2",
            "hrrr.t19z.wrfprsf48.grib2",
        ]);
        assert_eq!(latest_cycle_hour(&listing, "wrfsfc", "f48"), Some(12));
        assert_eq!(latest_cycle_hour(&listing, "wrfsfc", "f18"), Some(18));
    }

    #[test]
    fn test_latest_cycle_hour_none() {
        let listing = keys(&["hrrr.t02z.wrfsfcf10.grib2"]);
        assert_eq!(latest_cycle_hour(&listing, "wrfsfc", "f48"), None);
    }

    #[test]
    fn test_default_policy() {
        let policy = DiscoveryPolicy::default();
        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.step_days, 1);
    }
}
