//! Per-region assembly of partial GRIB2 retrievals.
//!
//! For each plan entry, in order:
//! 1. Fetch and parse the `.idx` sidecar
//! 2. Select the configured variables/levels
//! 3. Fetch only those byte ranges into a scratch slice
//! 4. Clip the slice once per region
//! 5. Append each result to that region's output file
//!
//! Missing objects and failed clips leave a documented gap; service errors
//! and malformed indexes abort the assembly and discard partial output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use grib_index::{index_key, parse_index, VariableFilter};
use hrrr_common::{ByteRange, HrrrError, HrrrResult, Region};
use storage::ObjectStorage;

use crate::clip::{verify_output, RegionClipper};
use crate::plan::{PlanEntry, RetrievalPlan};

/// Name of the single output stream when no regions are configured.
pub const UNCLIPPED_REGION: &str = "conus";

/// Local assembly settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Directory for scratch slices and assembled output
    pub work_dir: PathBuf,
    /// Range requests in flight per file (1 = sequential)
    pub range_concurrency: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp"),
            range_concurrency: 1,
        }
    }
}

/// Why a planned hour is missing from an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum GapReason {
    MissingIndex,
    MissingData,
    NoMatchingRecords,
    ClipFailed(String),
}

impl GapReason {
    fn label(&self) -> &'static str {
        match self {
            GapReason::MissingIndex => "missing_index",
            GapReason::MissingData => "missing_data",
            GapReason::NoMatchingRecords => "no_matching_records",
            GapReason::ClipFailed(_) => "clip_failed",
        }
    }
}

/// A planned hour absent from one (or every) output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanGap {
    pub key: String,
    pub forecast_hour: u32,
    pub valid_hour: i64,
    /// Affected region; None when every output misses the hour
    pub region: Option<String>,
    pub reason: GapReason,
}

/// One finished output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledOutput {
    pub region: String,
    pub path: PathBuf,
    pub bytes: u64,
    /// Valid hours appended, in order
    pub valid_hours: Vec<i64>,
}

impl AssembledOutput {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Outcome of a completed assembly.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub day: NaiveDate,
    pub label_run_hour: u32,
    pub planned: usize,
    pub outputs: Vec<AssembledOutput>,
    pub gaps: Vec<PlanGap>,
}

impl AssemblyReport {
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }
}

/// Output file name: "hrrr-<region>-YYYY-MM-DD-HH.grib2"
pub fn output_file_name(region: &str, day: NaiveDate, run_hour: u32) -> String {
    format!("hrrr-{}-{}-{:02}.grib2", region, day.format("%Y-%m-%d"), run_hour)
}

/// Scratch slice path for a source key.
pub fn scratch_path(work_dir: &Path, key: &str) -> PathBuf {
    work_dir.join(key.replace('/', "_"))
}

/// Clipped slice path for a scratch slice and region.
pub fn clipped_path(scratch: &Path, region: &str) -> PathBuf {
    let name = scratch
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), ext.to_string()),
        None => (name.clone(), "grib2".to_string()),
    };
    scratch.with_file_name(format!("{}.{}.small.{}", stem, region, ext))
}

/// An append-only output file for one region.
struct OutputAssembly {
    region: String,
    path: PathBuf,
    file: File,
    bytes: u64,
    valid_hours: Vec<i64>,
}

impl OutputAssembly {
    async fn create(region: &str, path: PathBuf) -> HrrrResult<Self> {
        info!(path = %path.display(), "Creating output");
        let file = File::create(&path).await?;
        Ok(Self {
            region: region.to_string(),
            path,
            file,
            bytes: 0,
            valid_hours: Vec::new(),
        })
    }

    async fn append(&mut self, slice: &Path, valid_hour: i64) -> HrrrResult<()> {
        let mut input = File::open(slice).await?;
        let copied = tokio::io::copy(&mut input, &mut self.file).await?;
        self.bytes += copied;
        self.valid_hours.push(valid_hour);
        Ok(())
    }

    async fn finish(mut self) -> HrrrResult<AssembledOutput> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        info!(path = %self.path.display(), bytes = self.bytes, "Output created");
        Ok(AssembledOutput {
            region: self.region,
            path: self.path,
            bytes: self.bytes,
            valid_hours: self.valid_hours,
        })
    }

    async fn discard(self) {
        let path = self.path;
        drop(self.file);
        if let Err(e) = fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove partial output");
        }
    }
}

/// Outcome of retrieving one planned file.
enum SliceOutcome {
    Ready(PathBuf),
    Gap(GapReason),
}

/// Drives retrieval, clipping and appending for a retrieval plan.
pub struct Assembler {
    source: ObjectStorage,
    filter: VariableFilter,
    config: AssemblyConfig,
    regions: Vec<Region>,
    clipper: Option<Arc<dyn RegionClipper>>,
}

impl Assembler {
    /// Create an assembler that writes unclipped slices to a single output.
    pub fn new(source: ObjectStorage, filter: VariableFilter, config: AssemblyConfig) -> Self {
        Self {
            source,
            filter,
            config,
            regions: Vec::new(),
            clipper: None,
        }
    }

    /// Clip every slice to each region, producing one output per region.
    pub fn with_regions(mut self, regions: Vec<Region>, clipper: Arc<dyn RegionClipper>) -> Self {
        if !regions.is_empty() {
            self.regions = regions;
            self.clipper = Some(clipper);
        }
        self
    }

    /// Names of the output streams, in output order.
    pub fn stream_names(&self) -> Vec<String> {
        if self.clipper.is_some() {
            self.regions.iter().map(|r| r.name.clone()).collect()
        } else {
            vec![UNCLIPPED_REGION.to_string()]
        }
    }

    /// Run the whole plan.
    ///
    /// Output files are only returned once every entry has been processed.
    /// On error, partial outputs are removed.
    #[instrument(skip(self, plan), fields(day = %plan.day, files = plan.len()))]
    pub async fn assemble(&self, plan: &RetrievalPlan) -> HrrrResult<AssemblyReport> {
        fs::create_dir_all(&self.config.work_dir).await?;

        let mut streams = Vec::new();
        for name in self.stream_names() {
            let path = self
                .config
                .work_dir
                .join(output_file_name(&name, plan.day, plan.label_run_hour));
            match OutputAssembly::create(&name, path).await {
                Ok(stream) => streams.push(stream),
                Err(e) => {
                    discard_all(streams).await;
                    return Err(e);
                }
            }
        }

        let mut gaps = Vec::new();
        for (idx, entry) in plan.iter().enumerate() {
            info!(n = idx + 1, total = plan.len(), key = %entry.key, "Download");
            if let Err(e) = self.process_entry(entry, &mut streams, &mut gaps).await {
                warn!(key = %entry.key, error = %e, "Assembly aborted, discarding partial output");
                discard_all(streams).await;
                return Err(e);
            }
        }

        let mut outputs = Vec::with_capacity(streams.len());
        for stream in streams {
            outputs.push(stream.finish().await?);
        }

        if !gaps.is_empty() {
            warn!(gaps = gaps.len(), "Assembly completed with gaps");
        }

        Ok(AssemblyReport {
            day: plan.day,
            label_run_hour: plan.label_run_hour,
            planned: plan.len(),
            outputs,
            gaps,
        })
    }

    async fn process_entry(
        &self,
        entry: &PlanEntry,
        streams: &mut [OutputAssembly],
        gaps: &mut Vec<PlanGap>,
    ) -> HrrrResult<()> {
        let scratch = match self.retrieve_slice(entry).await? {
            SliceOutcome::Ready(path) => path,
            SliceOutcome::Gap(reason) => {
                record_gap(gaps, entry, None, reason);
                return Ok(());
            }
        };

        let result = match &self.clipper {
            None => streams[0].append(&scratch, entry.valid_hour).await,
            Some(clipper) => {
                self.clip_and_append(clipper.as_ref(), entry, &scratch, streams, gaps)
                    .await
            }
        };

        debug!(path = %scratch.display(), "Removing scratch slice");
        remove_quietly(&scratch).await;
        result
    }

    async fn clip_and_append(
        &self,
        clipper: &dyn RegionClipper,
        entry: &PlanEntry,
        scratch: &Path,
        streams: &mut [OutputAssembly],
        gaps: &mut Vec<PlanGap>,
    ) -> HrrrResult<()> {
        for (region, stream) in self.regions.iter().zip(streams.iter_mut()) {
            let clipped = clipped_path(scratch, &region.name);
            info!(region = %region.name, path = %clipped.display(), "Extract region");

            let clip_result = match clipper.clip(scratch, region, &clipped).await {
                Ok(()) => verify_output(&clipped).await.map(|_| ()),
                Err(e) => Err(e),
            };
            metrics::counter!("hrrr_clips_total").increment(1);

            let appended = match clip_result {
                Ok(()) => stream.append(&clipped, entry.valid_hour).await,
                Err(HrrrError::ClipFailed(msg)) => {
                    warn!(region = %region.name, key = %entry.key, error = %msg, "Clip failed");
                    record_gap(gaps, entry, Some(&region.name), GapReason::ClipFailed(msg));
                    Ok(())
                }
                Err(e) => Err(e),
            };

            remove_quietly(&clipped).await;
            appended?;
        }
        Ok(())
    }

    /// Fetch the selected messages of one forecast file into a scratch slice.
    async fn retrieve_slice(&self, entry: &PlanEntry) -> HrrrResult<SliceOutcome> {
        let idx_key = index_key(&entry.key);
        let index_text = match self.source.get_text(&idx_key).await {
            Ok(text) => text,
            Err(HrrrError::NotFound(_)) => {
                warn!(key = %idx_key, "GRIB index not available on the server");
                return Ok(SliceOutcome::Gap(GapReason::MissingIndex));
            }
            Err(e) => return Err(e),
        };

        let records = parse_index(&index_text)?;
        let ranges: Vec<ByteRange> = self
            .filter
            .select(&records)
            .into_iter()
            .map(|r| r.byte_range())
            .collect();

        if ranges.is_empty() {
            warn!(key = %entry.key, "No index records match the filter");
            return Ok(SliceOutcome::Gap(GapReason::NoMatchingRecords));
        }

        let chunks = match self.fetch_ranges(&entry.key, &ranges).await {
            Ok(chunks) => chunks,
            Err(HrrrError::NotFound(_)) => {
                warn!(key = %entry.key, "GRIB not available on the server");
                return Ok(SliceOutcome::Gap(GapReason::MissingData));
            }
            Err(e) => return Err(e),
        };

        let scratch = scratch_path(&self.config.work_dir, &entry.key);
        let file = File::create(&scratch).await?;
        write_scratch(&scratch, file, &chunks).await?;
        info!(path = %scratch.display(), ranges = chunks.len(), "Slice created");

        Ok(SliceOutcome::Ready(scratch))
    }

    /// Fetch ranges with bounded concurrency, returning them in request order.
    async fn fetch_ranges(&self, key: &str, ranges: &[ByteRange]) -> HrrrResult<Vec<Bytes>> {
        let source = &self.source;

        let results: Vec<(usize, HrrrResult<Bytes>)> = stream::iter(ranges.iter().copied().enumerate())
            .map(|(i, range)| async move {
                debug!(key = %key, range = %range, "Downloading range");
                (i, source.get_range(key, range).await)
            })
            .buffer_unordered(self.config.range_concurrency.max(1))
            .collect()
            .await;

        let chunks = merge_in_order(key, ranges.len(), results)?;
        for chunk in &chunks {
            metrics::counter!("hrrr_ranges_fetched_total").increment(1);
            metrics::counter!("hrrr_bytes_fetched_total").increment(chunk.len() as u64);
        }
        Ok(chunks)
    }
}

/// Order fetch results by request position, never by completion order.
///
/// The error reported is the one of the lowest failing position, so the
/// outcome for a file does not depend on which request finished first.
fn merge_in_order(
    key: &str,
    expected: usize,
    mut results: Vec<(usize, HrrrResult<Bytes>)>,
) -> HrrrResult<Vec<Bytes>> {
    results.sort_by_key(|(i, _)| *i);

    let mut chunks = Vec::with_capacity(expected);
    for (i, result) in results {
        if i != chunks.len() {
            return Err(HrrrError::storage(format!(
                "range {} of {} missing",
                chunks.len(),
                key
            )));
        }
        chunks.push(result?);
    }

    if chunks.len() != expected {
        return Err(HrrrError::storage(format!(
            "range {} of {} missing",
            chunks.len(),
            key
        )));
    }
    Ok(chunks)
}

/// Write fetched chunks to a scratch slice; the slice is removed if writing fails.
async fn write_scratch<W>(path: &Path, mut file: W, chunks: &[Bytes]) -> HrrrResult<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        for chunk in chunks {
            file.write_all(chunk).await?;
        }
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        warn!(path = %path.display(), error = %e, "Failed to write scratch slice");
        drop(file);
        remove_quietly(path).await;
        return Err(e.into());
    }
    Ok(())
}

fn record_gap(gaps: &mut Vec<PlanGap>, entry: &PlanEntry, region: Option<&str>, reason: GapReason) {
    metrics::counter!("hrrr_plan_gaps_total", "reason" => reason.label()).increment(1);
    gaps.push(PlanGap {
        key: entry.key.clone(),
        forecast_hour: entry.forecast_hour,
        valid_hour: entry.valid_hour,
        region: region.map(str::to_string),
        reason,
    });
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove intermediate file");
        }
    }
}

async fn discard_all(streams: Vec<OutputAssembly>) {
    for stream in streams {
        stream.discard().await;
    }
}
