//! Inclusive byte ranges within a remote object.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An inclusive byte range `[start, end]`.
///
/// `end == None` means "through the end of the object".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn to_end(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Number of bytes covered, when the end is known.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start) + 1)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.end, Some(end) if end < self.start)
    }

    /// Half-open form for an object of `object_size` bytes.
    pub fn resolve(&self, object_size: u64) -> std::ops::Range<u64> {
        let end = match self.end {
            Some(end) => (end + 1).min(object_size),
            None => object_size,
        };
        self.start.min(end)..end
    }
}

impl fmt::Display for ByteRange {
    /// HTTP Range header form: "bytes=0-499" or "bytes=900-"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "bytes={}-{}", self.start, end),
            None => write!(f, "bytes={}-", self.start),
        }
    }
}
