//! Error types for HRRR retrieval.

use thiserror::Error;

/// Result type alias using HrrrError.
pub type HrrrResult<T> = Result<T, HrrrError>;

/// Primary error type for discovery, retrieval and assembly.
#[derive(Debug, Error)]
pub enum HrrrError {
    // === Discovery Errors ===
    #[error("No model run found in the last {attempts} probes")]
    DiscoveryExhausted { attempts: u32 },

    #[error("Forecast cycle not found: {0}")]
    CycleNotFound(String),

    // === Retrieval Errors ===
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Malformed index at line {line}: {message}")]
    IndexParse { line: usize, message: String },

    // === Assembly Errors ===
    #[error("Region clip failed: {0}")]
    ClipFailed(String),

    #[error("Invalid retrieval plan: {0}")]
    InvalidPlan(String),

    // === Infrastructure Errors ===
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HrrrError {
    /// Create a NotFound error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Create a StorageError.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    /// Create an IndexParse error.
    pub fn index_parse(line: usize, message: impl Into<String>) -> Self {
        Self::IndexParse {
            line,
            message: message.into(),
        }
    }

    /// Create a ClipFailed error.
    pub fn clip_failed(msg: impl Into<String>) -> Self {
        Self::ClipFailed(msg.into())
    }

    /// True for the per-hour conditions that leave a gap instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HrrrError::NotFound(_) | HrrrError::ClipFailed(_) | HrrrError::DiscoveryExhausted { .. }
        )
    }
}

impl From<serde_json::Error> for HrrrError {
    fn from(err: serde_json::Error) -> Self {
        HrrrError::ConfigError(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(HrrrError::not_found("hrrr.20240115/conus/x.idx").is_recoverable());
        assert!(HrrrError::clip_failed("empty output").is_recoverable());
        assert!(HrrrError::DiscoveryExhausted { attempts: 7 }.is_recoverable());
        assert!(!HrrrError::storage("503 Slow Down").is_recoverable());
        assert!(!HrrrError::index_parse(3, "missing offset").is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = HrrrError::index_parse(12, "expected numeric byte offset");
        assert_eq!(
            err.to_string(),
            "Malformed index at line 12: expected numeric byte offset"
        );
    }
}
