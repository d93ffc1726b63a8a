//! Storage abstractions for HRRR retrieval.
//!
//! Provides a single interface over S3-compatible buckets for:
//! - Reading the NOAA source bucket (listing, whole objects, byte ranges)
//! - Writing assembled output to a publish bucket

pub mod object_store;

pub use self::object_store::{AccessMode, ObjectStorage, ObjectStorageConfig};
