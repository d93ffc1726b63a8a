//! Retrieval planning across the 18-hour and 48-hour cycles.
//!
//! The plan covers every hour from "now" through the end of the 48-hour
//! cycle. Hours still covered by the more recent 18-hour run are taken from
//! it; the rest come from the 48-hour run, starting at the first hour the
//! 18-hour run does not reach.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use hrrr_common::{CycleLength, HrrrError, HrrrResult, ModelRun};

/// One forecast file to retrieve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    /// Object key of the GRIB2 file
    pub key: String,
    pub run_hour: u32,
    pub forecast_hour: u32,
    /// Valid time as hours since 00Z of the plan day
    pub valid_hour: i64,
}

/// Ordered list of forecast files for one assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalPlan {
    pub day: NaiveDate,
    /// Run hour used to label the assembled output
    pub label_run_hour: u32,
    pub entries: Vec<PlanEntry>,
}

impl RetrievalPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlanEntry> {
        self.entries.iter()
    }

    /// Valid hours in plan order.
    pub fn valid_hours(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.valid_hour).collect()
    }

    /// Check that valid hours strictly increase, so no real time is covered twice.
    pub fn validate(&self) -> HrrrResult<()> {
        for pair in self.entries.windows(2) {
            if pair[1].valid_hour <= pair[0].valid_hour {
                return Err(HrrrError::InvalidPlan(format!(
                    "{} (valid hour {}) does not follow {} (valid hour {})",
                    pair[1].key, pair[1].valid_hour, pair[0].key, pair[0].valid_hour
                )));
            }
        }
        Ok(())
    }
}

/// Builds retrieval plans for one day directory.
pub struct PlanBuilder {
    day: NaiveDate,
}

impl PlanBuilder {
    pub fn new(day: NaiveDate) -> Self {
        Self { day }
    }

    /// Build the plan.
    ///
    /// `current_hour` counts hours since 00Z of the plan day, so it exceeds 23
    /// when the day directory is older than today.
    pub fn build(
        &self,
        long_run_hour: u32,
        short_run_hour: Option<u32>,
        current_hour: i64,
    ) -> HrrrResult<RetrievalPlan> {
        let long_run = ModelRun::new(self.day, long_run_hour);

        let (entries, label_run_hour) = match short_run_hour {
            Some(short) if short == long_run_hour => {
                let start = current_hour - short as i64;
                (self.segment(long_run, CycleLength::Long48, start), short)
            }
            Some(short) => {
                let short_run = ModelRun::new(self.day, short);
                let mut entries =
                    self.segment(short_run, CycleLength::Short18, current_hour - short as i64);

                // First long-cycle hour the short cycle does not reach
                let handoff = short as i64 - long_run_hour as i64 + 19;
                entries.extend(self.segment(long_run, CycleLength::Long48, handoff));
                (entries, short)
            }
            None => {
                let start = current_hour - long_run_hour as i64;
                (self.segment(long_run, CycleLength::Long48, start), long_run_hour)
            }
        };

        let plan = RetrievalPlan {
            day: self.day,
            label_run_hour,
            entries,
        };
        plan.validate()?;

        info!(
            day = %self.day,
            long_run_hour = long_run_hour,
            short_run_hour = ?short_run_hour,
            files = plan.len(),
            "Built retrieval plan"
        );
        Ok(plan)
    }

    /// Forecast hours `start..=max` of one run.
    ///
    /// `start` is clamped into `0..=max`, so a segment always holds at least
    /// the final forecast hour of its cycle.
    fn segment(&self, run: ModelRun, length: CycleLength, start: i64) -> Vec<PlanEntry> {
        let max = length.max_forecast_hour() as i64;

        let first = if start < 0 {
            warn!(
                run_hour = run.run_hour,
                requested = start,
                "Start hour precedes the run, narrowing to forecast hour 0"
            );
            0
        } else if start > max {
            warn!(
                run_hour = run.run_hour,
                requested = start,
                max = max,
                "Start hour beyond the cycle, narrowing to the final forecast hour"
            );
            max
        } else {
            start
        };

        (first..=max)
            .map(|fh| {
                let forecast_hour = fh as u32;
                PlanEntry {
                    key: run.surface_key(forecast_hour),
                    run_hour: run.run_hour,
                    forecast_hour,
                    valid_hour: run.run_hour as i64 + fh,
                }
            })
            .collect()
    }
}
