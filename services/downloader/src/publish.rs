//! Publication of assembled output to the redistribution bucket.
//!
//! Output files are first uploaded under a staging prefix. Only once every
//! upload has succeeded are they moved to their base names, followed by a
//! manifest listing those names (one per line) and a JSON run report with any
//! gaps. Downstream clients read the manifest and pick files by region name.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use hrrr_common::HrrrResult;
use storage::{AccessMode, ObjectStorage, ObjectStorageConfig};

use crate::assembler::AssemblyReport;

/// Destination for assembled output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Upload after assembly
    pub enabled: bool,
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access: AccessMode,
    pub allow_http: bool,
    /// Manifest object name
    pub manifest_name: String,
    /// Run report object name
    pub report_name: String,
    /// Prefix outputs are uploaded under before they are promoted
    pub staging_prefix: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bucket: "com.gybetime.grib".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access: AccessMode::Credentialed,
            allow_http: false,
            manifest_name: "grib-list.txt".to_string(),
            report_name: "run-report.json".to_string(),
            staging_prefix: "incoming".to_string(),
        }
    }
}

impl PublishConfig {
    pub fn storage_config(&self) -> ObjectStorageConfig {
        ObjectStorageConfig {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            access: self.access,
            allow_http: self.allow_http,
        }
    }
}

/// List of published file names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub files: Vec<String>,
}

impl Manifest {
    /// Parse manifest text, ignoring blank lines.
    pub fn parse(text: &str) -> Self {
        Self {
            files: text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Manifest text: each name followed by a newline.
    pub fn to_text(&self) -> String {
        self.files.iter().map(|f| format!("{}\n", f)).collect()
    }

    /// Files whose name contains any of `regions`; every file if `regions` is empty.
    pub fn matching<S: AsRef<str>>(&self, regions: &[S]) -> Vec<&str> {
        self.files
            .iter()
            .filter(|f| regions.is_empty() || regions.iter().any(|r| f.contains(r.as_ref())))
            .map(String::as_str)
            .collect()
    }
}

/// Uploads assembled outputs, the manifest and the run report.
pub struct Publisher {
    storage: ObjectStorage,
    manifest_name: String,
    report_name: String,
    staging_prefix: String,
}

impl Publisher {
    pub fn new(config: &PublishConfig) -> HrrrResult<Self> {
        Ok(Self::with_storage(
            ObjectStorage::new(&config.storage_config())?,
            config,
        ))
    }

    pub fn with_storage(storage: ObjectStorage, config: &PublishConfig) -> Self {
        Self {
            storage,
            manifest_name: config.manifest_name.clone(),
            report_name: config.report_name.clone(),
            staging_prefix: config.staging_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Upload a completed assembly.
    ///
    /// A failed upload removes the staged copies and leaves the published
    /// names, manifest and report untouched.
    #[instrument(skip(self, report), fields(bucket = %self.storage.bucket()))]
    pub async fn publish(&self, report: &AssemblyReport) -> HrrrResult<Manifest> {
        let mut manifest = Manifest::default();
        let mut staged = Vec::with_capacity(report.outputs.len());

        for output in &report.outputs {
            let name = output.file_name();
            let staging_key = self.staging_key(&name);
            info!(
                path = %output.path.display(),
                target = %format!("s3://{}/{}", self.storage.bucket(), staging_key),
                "Uploading"
            );
            if let Err(e) = self.storage.put_file(&staging_key, &output.path).await {
                warn!(name = %name, error = %e, "Upload failed, removing staged outputs");
                self.discard_staged(&staged).await;
                return Err(e);
            }
            staged.push(staging_key);
            manifest.files.push(name);
        }

        for (staging_key, name) in staged.iter().zip(&manifest.files) {
            self.storage.rename(staging_key, name).await?;
        }

        info!(name = %self.manifest_name, files = manifest.files.len(), "Uploading manifest");
        self.storage
            .put(&self.manifest_name, Bytes::from(manifest.to_text()))
            .await?;

        let report_json = serde_json::to_vec_pretty(report)?;
        self.storage
            .put(&self.report_name, Bytes::from(report_json))
            .await?;

        Ok(manifest)
    }

    fn staging_key(&self, name: &str) -> String {
        format!("{}/{}", self.staging_prefix, name)
    }

    async fn discard_staged(&self, staged: &[String]) {
        for key in staged {
            if let Err(e) = self.storage.delete(key).await {
                warn!(key = %key, error = %e, "Failed to remove staged output");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use hrrr_common::HrrrError;
    use object_store::memory::InMemory;

    use crate::assembler::AssembledOutput;

    #[test]
    fn test_manifest_round_trip_text() {
        let text = "hrrr-new-england-2024-01-15-18.grib2\nhrrr-san-francisco-2024-01-15-18.grib2\n";
        let manifest = Manifest::parse(text);
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.to_text(), text);
    }

    #[test]
    fn test_manifest_matching() {
        let manifest = Manifest::parse(
            "hrrr-new-england-2024-01-15-18.grib2\nhrrr-san-francisco-2024-01-15-18.grib2\nhrrr-coastal-cup-2024-01-15-18.grib2\n",
        );
        assert_eq!(
            manifest.matching(&["san-francisco"]),
            vec!["hrrr-san-francisco-2024-01-15-18.grib2"]
        );
        assert_eq!(manifest.matching::<&str>(&[]).len(), 3);
        assert!(manifest.matching(&["gulf"]).is_empty());
    }

    fn report_with(paths: Vec<PathBuf>) -> AssemblyReport {
        AssemblyReport {
            day: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            label_run_hour: 18,
            planned: 1,
            outputs: paths
                .into_iter()
                .map(|path| AssembledOutput {
                    region: "conus".to_string(),
                    path,
                    bytes: 4,
                    valid_hours: vec![20],
                })
                .collect(),
            gaps: Vec::new(),
        }
    }

    fn memory_publisher() -> (Publisher, ObjectStorage) {
        let bucket = ObjectStorage::from_store(Arc::new(InMemory::new()), "com.gybetime.grib");
        (
            Publisher::with_storage(bucket.clone(), &PublishConfig::default()),
            bucket,
        )
    }

    #[tokio::test]
    async fn test_publish_promotes_staged_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let ne = dir.path().join("hrrr-new-england-2024-01-15-18.grib2");
        let sf = dir.path().join("hrrr-san-francisco-2024-01-15-18.grib2");
        tokio::fs::write(&ne, b"GRIB").await.unwrap();
        tokio::fs::write(&sf, b"GRIB").await.unwrap();

        let (publisher, bucket) = memory_publisher();
        let manifest = publisher.publish(&report_with(vec![ne, sf])).await.unwrap();

        assert_eq!(manifest.files.len(), 2);
        let mut keys = bucket.list("").await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "grib-list.txt",
                "hrrr-new-england-2024-01-15-18.grib2",
                "hrrr-san-francisco-2024-01-15-18.grib2",
                "run-report.json",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_upload_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ne = dir.path().join("hrrr-new-england-2024-01-15-18.grib2");
        tokio::fs::write(&ne, b"GRIB").await.unwrap();
        // Second output vanished before upload
        let sf = dir.path().join("hrrr-san-francisco-2024-01-15-18.grib2");

        let (publisher, bucket) = memory_publisher();
        let err = publisher.publish(&report_with(vec![ne, sf])).await.unwrap_err();

        assert!(matches!(err, HrrrError::Io(_)));
        assert!(bucket.list("").await.unwrap().is_empty());
    }

    #[test]
    fn test_default_publish_is_credentialed() {
        let config = PublishConfig::default();
        assert_eq!(config.access, AccessMode::Credentialed);
        assert_eq!(config.manifest_name, "grib-list.txt");
    }
}
