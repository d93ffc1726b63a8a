//! Geographic clipping of GRIB2 slices.
//!
//! Clipping is a capability behind [`RegionClipper`]; the default
//! implementation shells out to wgrib2.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use hrrr_common::{HrrrError, HrrrResult, Region};

/// Clips one local GRIB2 file to a region, writing a new local file.
#[async_trait]
pub trait RegionClipper: Send + Sync {
    async fn clip(&self, input: &Path, region: &Region, output: &Path) -> HrrrResult<()>;
}

/// Settings for the external clipping tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    /// Clip each slice when regions are configured
    pub enabled: bool,
    /// Path of the wgrib2 binary
    pub binary: PathBuf,
    /// Sub-setting option passed before the bounds
    pub flag: String,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: PathBuf::from("/usr/local/bin/wgrib2"),
            flag: "-small_grib".to_string(),
        }
    }
}

/// Runs `wgrib2 <input> <flag> <lon_min:lon_max> <lat_min:lat_max> <output>`.
pub struct Wgrib2Clipper {
    binary: PathBuf,
    flag: String,
}

impl Wgrib2Clipper {
    pub fn new(config: &ClipConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            flag: config.flag.clone(),
        }
    }

    /// Command-line arguments for one clip.
    pub fn args(&self, input: &Path, region: &Region, output: &Path) -> Vec<String> {
        vec![
            input.display().to_string(),
            self.flag.clone(),
            region.lon_bounds(),
            region.lat_bounds(),
            output.display().to_string(),
        ]
    }
}

#[async_trait]
impl RegionClipper for Wgrib2Clipper {
    #[instrument(skip(self), fields(region = %region.name))]
    async fn clip(&self, input: &Path, region: &Region, output: &Path) -> HrrrResult<()> {
        let args = self.args(input, region, output);
        debug!(binary = %self.binary.display(), args = ?args, "Running clipper");

        let result = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                HrrrError::clip_failed(format!("failed to run {}: {}", self.binary.display(), e))
            })?;

        // wgrib2 does not always report failure through its exit status;
        // the caller checks the output file.
        if !result.status.success() {
            warn!(
                status = ?result.status.code(),
                stderr = %String::from_utf8_lossy(&result.stderr).trim(),
                "Clipper exited with failure status"
            );
        }

        Ok(())
    }
}

/// Succeeds only if `output` exists and is non-empty.
pub async fn verify_output(output: &Path) -> HrrrResult<u64> {
    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        Ok(_) => Err(HrrrError::clip_failed(format!(
            "{} is empty",
            output.display()
        ))),
        Err(_) => Err(HrrrError::clip_failed(format!(
            "{} was not created",
            output.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrrr_common::default_regions;

    #[test]
    fn test_wgrib2_args() {
        let clipper = Wgrib2Clipper::new(&ClipConfig::default());
        let region = &default_regions()[1];
        let args = clipper.args(
            Path::new("/tmp/in.grib2"),
            region,
            Path::new("/tmp/out.grib2"),
        );
        assert_eq!(
            args,
            vec![
                "/tmp/in.grib2",
                "-small_grib",
                "-123.3:-121.5",
                "36.5:38",
                "/tmp/out.grib2"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_fails() {
        let config = ClipConfig {
            binary: PathBuf::from("/nonexistent/wgrib2"),
            ..ClipConfig::default()
        };
        let clipper = Wgrib2Clipper::new(&config);
        let err = clipper
            .clip(
                Path::new("/tmp/in.grib2"),
                &default_regions()[0],
                Path::new("/tmp/out.grib2"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HrrrError::ClipFailed(_)));
    }

    #[tokio::test]
    async fn test_verify_output() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.grib2");
        assert!(verify_output(&missing).await.is_err());

        let empty = dir.path().join("empty.grib2");
        tokio::fs::write(&empty, b"").await.unwrap();
        assert!(verify_output(&empty).await.is_err());

        let good = dir.path().join("good.grib2");
        tokio::fs::write(&good, b"GRIB").await.unwrap();
        assert_eq!(verify_output(&good).await.unwrap(), 4);
    }
}
