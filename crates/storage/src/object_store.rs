//! Object storage interface for HRRR source and publish buckets (S3 compatible).

use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::{aws::AmazonS3Builder, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use hrrr_common::{ByteRange, HrrrError, HrrrResult};

/// How requests to a bucket are authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Anonymous, unsigned requests (NOAA open-data buckets)
    #[default]
    Unsigned,
    /// Credentials from the standard AWS environment variables
    Credentialed,
}

/// Configuration for one bucket connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Bucket name
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint (MinIO, localstack); None for AWS
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access: AccessMode,
    /// Allow HTTP (for a local endpoint)
    #[serde(default)]
    pub allow_http: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            bucket: "noaa-hrrr-bdp-pds".to_string(),
            region: default_region(),
            endpoint: None,
            access: AccessMode::Unsigned,
            allow_http: false,
        }
    }
}

/// Object storage client for one bucket.
///
/// Reads never mutate shared state, so one client can serve concurrent range requests.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create a new object storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> HrrrResult<Self> {
        let mut builder = match config.access {
            AccessMode::Unsigned => AmazonS3Builder::new().with_skip_signature(true),
            AccessMode::Credentialed => AmazonS3Builder::from_env(),
        }
        .with_bucket_name(&config.bucket)
        .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| HrrrError::storage(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// Wrap an existing store (in-memory or local filesystem backends).
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Read a whole object.
    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    pub async fn get(&self, key: &str) -> HrrrResult<Bytes> {
        let location = Path::from(key);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| classify(key, e))?;

        let bytes = result.bytes().await.map_err(|e| classify(key, e))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Read a whole object as UTF-8 text.
    pub async fn get_text(&self, key: &str) -> HrrrResult<String> {
        let bytes = self.get(key).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| HrrrError::storage(format!("{} is not valid UTF-8: {}", key, e)))
    }

    /// Size of an object in bytes.
    pub async fn size(&self, key: &str) -> HrrrResult<u64> {
        let location = Path::from(key);
        let meta = self
            .store
            .head(&location)
            .await
            .map_err(|e| classify(key, e))?;
        Ok(meta.size as u64)
    }

    /// Read the inclusive byte range `[start, end]` of an object.
    ///
    /// An open-ended range is resolved against the object size first.
    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key, range = %range))]
    pub async fn get_range(&self, key: &str, range: ByteRange) -> HrrrResult<Bytes> {
        let location = Path::from(key);

        let span = match range.end {
            Some(end) => range.start as usize..(end as usize + 1),
            None => {
                let size = self.size(key).await?;
                let resolved = range.resolve(size);
                resolved.start as usize..resolved.end as usize
            }
        };

        if span.is_empty() {
            return Ok(Bytes::new());
        }

        let bytes = self
            .store
            .get_range(&location, span)
            .await
            .map_err(|e| classify(key, e))?;

        debug!(size = bytes.len(), "Read range");
        Ok(bytes)
    }

    /// Check if any object exists under a prefix.
    pub async fn has_objects(&self, prefix: &str) -> HrrrResult<bool> {
        let prefix_path = Path::from(prefix);
        let mut stream = self.store.list(Some(&prefix_path));

        match stream.next().await {
            Some(Ok(_)) => Ok(true),
            Some(Err(object_store::Error::NotFound { .. })) | None => Ok(false),
            Some(Err(e)) => Err(classify(prefix, e)),
        }
    }

    /// List object keys under a prefix.
    ///
    /// Paginated listings are followed to the end.
    pub async fn list(&self, prefix: &str) -> HrrrResult<Vec<String>> {
        let prefix_path = Path::from(prefix);
        let mut keys = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| HrrrError::storage(format!("List {} failed: {}", prefix, e)))?
        {
            keys.push(meta.location.to_string());
        }

        debug!(prefix = %prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    /// Write bytes to a key in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, key = %key))]
    pub async fn put(&self, key: &str, data: Bytes) -> HrrrResult<()> {
        let location = Path::from(key);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| HrrrError::storage(format!("Failed to write {}: {}", key, e)))?;

        Ok(())
    }

    /// Move an object to a new key, replacing any object already there.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn rename(&self, from: &str, to: &str) -> HrrrResult<()> {
        self.store
            .rename(&Path::from(from), &Path::from(to))
            .await
            .map_err(|e| HrrrError::storage(format!("Failed to move {} to {}: {}", from, to, e)))
    }

    /// Delete an object. Deleting a missing object is not an error.
    pub async fn delete(&self, key: &str) -> HrrrResult<()> {
        match self.store.delete(&Path::from(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(HrrrError::storage(format!("Failed to delete {}: {}", key, e))),
        }
    }

    /// Upload a local file to a key in the bucket.
    pub async fn put_file(&self, key: &str, path: &std::path::Path) -> HrrrResult<u64> {
        let data = tokio::fs::read(path).await?;
        let size = data.len() as u64;
        self.put(key, Bytes::from(data)).await?;
        Ok(size)
    }
}

/// Map a store error onto the retrieval taxonomy: a missing object is
/// recoverable per file, anything else is a service error.
fn classify(key: &str, err: object_store::Error) -> HrrrError {
    match err {
        object_store::Error::NotFound { .. } => HrrrError::not_found(key),
        e => HrrrError::storage(format!("Failed to read {}: {}", key, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use tokio_test::{assert_err, assert_ok};

    fn memory_storage() -> ObjectStorage {
        ObjectStorage::from_store(Arc::new(InMemory::new()), "test-bucket")
    }

    #[tokio::test]
    async fn test_range_is_inclusive() {
        let storage = memory_storage();
        storage
            .put("hrrr.20240115/conus/a.grib2", Bytes::from_static(b"0123456789"))
            .await
            .unwrap();

        let bytes = storage
            .get_range("hrrr.20240115/conus/a.grib2", ByteRange::new(2, 5))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"2345");

        let tail = storage
            .get_range("hrrr.20240115/conus/a.grib2", ByteRange::to_end(7))
            .await
            .unwrap();
        assert_eq!(&tail[..], b"789");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let storage = memory_storage();
        let err = storage
            .get_range("hrrr.20240115/conus/missing.grib2", ByteRange::new(0, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, HrrrError::NotFound(_)));

        let err = assert_err!(storage.get("missing.idx").await);
        assert!(matches!(err, HrrrError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_and_probe() {
        let storage = memory_storage();
        for key in [
            "hrrr.20240115/conus/hrrr.t00z.wrfsfcf00.grib2",
            "hrrr.20240115/conus/hrrr.t00z.wrfsfcf01.grib2",
            "hrrr.20240116/conus/hrrr.t00z.wrfsfcf00.grib2",
        ] {
            assert_ok!(storage.put(key, Bytes::from_static(b"GRIB")).await);
        }

        let keys = storage.list("hrrr.20240115/conus").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(storage.has_objects("hrrr.20240116/conus").await.unwrap());
        assert!(!storage.has_objects("hrrr.20240117/conus").await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let storage = memory_storage();
        assert_ok!(storage.put("staging/a.grib2", Bytes::from_static(b"GRIB")).await);

        assert_ok!(storage.rename("staging/a.grib2", "a.grib2").await);
        assert_eq!(&assert_ok!(storage.get("a.grib2").await)[..], b"GRIB");
        assert!(!storage.has_objects("staging").await.unwrap());

        assert_ok!(storage.delete("a.grib2").await);
        assert_ok!(storage.delete("a.grib2").await);
        assert!(storage.list("").await.unwrap().is_empty());
    }

    #[test]
    fn test_default_config_is_public_hrrr() {
        let config = ObjectStorageConfig::default();
        assert_eq!(config.bucket, "noaa-hrrr-bdp-pds");
        assert_eq!(config.access, AccessMode::Unsigned);
        assert!(ObjectStorage::new(&config).is_ok());
    }
}
