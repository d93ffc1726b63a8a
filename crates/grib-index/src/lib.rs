//! GRIB2 index (`.idx`) handling.
//!
//! NOAA publishes a text inventory next to every GRIB2 file on its buckets.
//! Parsing it gives the byte offset of each message, which lets callers pull
//! only the variables they need out of a multi-gigabyte file with ranged reads.

pub mod filter;
pub mod parser;

pub use filter::{levels, VariableFilter};
pub use parser::{parse_index, GribIndexRecord};

/// Object key of the index sidecar for a GRIB2 object.
pub fn index_key(grib_key: &str) -> String {
    format!("{}.idx", grib_key)
}
