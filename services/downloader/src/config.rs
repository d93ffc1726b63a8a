//! Configuration loading for the HRRR downloader.
//!
//! Loaded from a YAML file; every section is optional and defaults to the
//! production deployment (10 m wind, three Pacific/Atlantic regions, public NOAA
//! bucket in, credentialed publish bucket out).

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use grib_index::VariableFilter;
use hrrr_common::{default_regions, Region};
use storage::{AccessMode, ObjectStorageConfig};

use crate::assembler::AssemblyConfig;
use crate::clip::ClipConfig;
use crate::discovery::{CycleMarkers, DiscoveryPolicy};
use crate::publish::PublishConfig;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub discovery: DiscoveryPolicy,
    #[serde(default)]
    pub filter: VariableFilter,
    #[serde(default = "default_regions")]
    pub regions: Vec<Region>,
    #[serde(default)]
    pub clip: ClipConfig,
    #[serde(default)]
    pub assembly: AssemblyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            publish: PublishConfig::default(),
            discovery: DiscoveryPolicy::default(),
            filter: VariableFilter::default(),
            regions: default_regions(),
            clip: ClipConfig::default(),
            assembly: AssemblyConfig::default(),
        }
    }
}

/// Source bucket and naming markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access: AccessMode,
    pub allow_http: bool,
    pub markers: CycleMarkers,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let storage = ObjectStorageConfig::default();
        Self {
            bucket: storage.bucket,
            region: storage.region,
            endpoint: storage.endpoint,
            access: storage.access,
            allow_http: storage.allow_http,
            markers: CycleMarkers::default(),
        }
    }
}

impl SourceConfig {
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

impl AppConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded config");
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                info!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.filter.is_empty() {
            bail!("filter must name at least one variable and one level");
        }
        if self.discovery.max_attempts == 0 {
            bail!("discovery.max_attempts must be at least 1");
        }
        if self.assembly.range_concurrency == 0 {
            bail!("assembly.range_concurrency must be at least 1");
        }
        for region in &self.regions {
            region
                .validate()
                .with_context(|| format!("Invalid region '{}'", region.name))?;
        }
        let mut names: Vec<&str> = self.regions.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            bail!("region names must be unique");
        }
        Ok(())
    }

    /// Regions to clip to; empty when clipping is disabled.
    pub fn clip_regions(&self) -> Vec<Region> {
        if self.clip.enabled {
            self.regions.clone()
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_deployment() {
        let config = AppConfig::default();
        assert_eq!(config.source.bucket, "noaa-hrrr-bdp-pds");
        assert_eq!(config.source.access, AccessMode::Unsigned);
        assert_eq!(config.publish.bucket, "com.gybetime.grib");
        assert_eq!(config.filter.variables, vec!["UGRD", "VGRD"]);
        assert_eq!(config.regions.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let yaml = r#"
source:
  markers:
    product: wrfsfc
    long: f48
    short: f18

discovery:
  max_attempts: 3

filter:
  variables: [TMP]
  levels: ["2 m above ground"]

regions:
  - name: gulf
    nw: { lat: 30.5, lon: -90 }
    se: { lat: 28, lon: -85 }

clip:
  binary: /opt/wgrib2/bin/wgrib2

assembly:
  work_dir: /var/tmp/hrrr
  range_concurrency: 4
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.source.bucket, "noaa-hrrr-bdp-pds");
        assert_eq!(config.discovery.max_attempts, 3);
        assert_eq!(config.discovery.step_days, 1);
        assert_eq!(config.filter.variables, vec!["TMP"]);
        assert_eq!(config.regions[0].name, "gulf");
        assert_eq!(config.clip.flag, "-small_grib");
        assert_eq!(config.assembly.range_concurrency, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_regions() {
        let mut config = AppConfig::default();
        config.regions.push(config.regions[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clip_disabled_has_no_regions() {
        let mut config = AppConfig::default();
        config.clip.enabled = false;
        assert!(config.clip_regions().is_empty());
    }
}
