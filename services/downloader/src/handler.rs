//! End-to-end run: discover, plan, assemble, publish.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use hrrr_common::{HrrrError, HrrrResult};
use storage::ObjectStorage;

use crate::assembler::{Assembler, AssemblyReport};
use crate::clip::{RegionClipper, Wgrib2Clipper};
use crate::config::AppConfig;
use crate::discovery::{DiscoveredRun, RunDiscoverer};
use crate::plan::PlanBuilder;
use crate::publish::{Manifest, Publisher};

/// Result of one invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunOutcome {
    /// No model output inside the lookback window; try again later
    NoData { attempts: u32 },
    Completed {
        run: DiscoveredRun,
        report: AssemblyReport,
        manifest: Option<Manifest>,
    },
}

/// Wires the components together from an explicit configuration.
pub struct Pipeline {
    config: AppConfig,
    source: ObjectStorage,
    publisher: Option<Publisher>,
    clipper: Arc<dyn RegionClipper>,
}

impl Pipeline {
    /// Build S3 clients and the wgrib2 clipper from configuration.
    pub fn from_config(config: AppConfig) -> HrrrResult<Self> {
        let source = ObjectStorage::new(&config.source.storage_config())?;
        let publisher = if config.publish.enabled {
            Some(Publisher::new(&config.publish)?)
        } else {
            None
        };
        let clipper: Arc<dyn RegionClipper> = Arc::new(Wgrib2Clipper::new(&config.clip));
        Ok(Self::with_parts(config, source, publisher, clipper))
    }

    /// Assemble a pipeline from prebuilt parts.
    pub fn with_parts(
        config: AppConfig,
        source: ObjectStorage,
        publisher: Option<Publisher>,
        clipper: Arc<dyn RegionClipper>,
    ) -> Self {
        Self {
            config,
            source,
            publisher,
            clipper,
        }
    }

    /// Run once as of `now`.
    #[instrument(skip(self))]
    pub async fn run(&self, now: DateTime<Utc>) -> HrrrResult<RunOutcome> {
        let discoverer = RunDiscoverer::new(
            &self.source,
            self.config.discovery,
            self.config.source.markers.clone(),
        );

        let run = match discoverer.discover(now).await {
            Ok(run) => run,
            Err(HrrrError::DiscoveryExhausted { attempts }) => {
                warn!(attempts = attempts, "No HRRR run available, nothing to do");
                return Ok(RunOutcome::NoData { attempts });
            }
            Err(e) => return Err(e),
        };

        let plan = PlanBuilder::new(run.day).build(
            run.long.run_hour,
            run.short.map(|c| c.run_hour),
            run.current_hour,
        )?;

        let assembler = Assembler::new(
            self.source.clone(),
            self.config.filter.clone(),
            self.config.assembly.clone(),
        )
        .with_regions(self.config.clip_regions(), self.clipper.clone());

        let report = assembler.assemble(&plan).await?;

        let manifest = match &self.publisher {
            Some(publisher) => Some(publisher.publish(&report).await?),
            None => {
                info!("Publishing disabled, outputs left in the work directory");
                None
            }
        };

        info!(
            outputs = report.outputs.len(),
            gaps = report.gaps.len(),
            planned = report.planned,
            "Run complete"
        );

        Ok(RunOutcome::Completed {
            run,
            report,
            manifest,
        })
    }
}

/// Entry point for an event-triggered invocation.
///
/// The event carries no required fields; it is only logged.
pub async fn handle_event(pipeline: &Pipeline, event: serde_json::Value) -> HrrrResult<RunOutcome> {
    info!(event = %event, "Handling event");
    pipeline.run(Utc::now()).await
}
