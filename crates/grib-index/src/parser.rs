//! Parser for wgrib2-style inventory lines.
//!
//! Each line of an `.idx` sidecar describes one GRIB2 message:
//!
//! ```text
//! 71:44268733:d=2024011512:UGRD:10 m above ground:6 hour fcst:
//! ```
//!
//! Field 1 is the byte offset of the message, field 3 the variable and
//! field 4 the vertical level.

use serde::Serialize;
use tracing::debug;

use hrrr_common::{ByteRange, HrrrError, HrrrResult};

const OFFSET_FIELD: usize = 1;
const VARIABLE_FIELD: usize = 3;
const LEVEL_FIELD: usize = 4;
const FORECAST_FIELD: usize = 5;

/// One message of a GRIB2 file as listed by its index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GribIndexRecord {
    /// Message number as written in the index ("71", "50.1", ...)
    pub record_number: String,
    pub start_byte: u64,
    /// Last byte of the message. `None` for the final message of the file.
    pub end_byte: Option<u64>,
    /// Variable short name (e.g., "UGRD")
    pub variable: String,
    /// Level description (e.g., "10 m above ground")
    pub level: String,
    /// Forecast description (e.g., "6 hour fcst"), empty if absent
    pub forecast: String,
}

impl GribIndexRecord {
    /// Byte range to request for this message.
    pub fn byte_range(&self) -> ByteRange {
        match self.end_byte {
            Some(end) => ByteRange::new(self.start_byte, end),
            None => ByteRange::to_end(self.start_byte),
        }
    }

    /// True for the final message, whose end is only known from the object size.
    pub fn is_open_ended(&self) -> bool {
        self.end_byte.is_none()
    }
}

/// Parse the text of an index file into ordered records.
///
/// Each record's `end_byte` is the next record's `start_byte - 1`. Sub-messages
/// that share an offset take their end from the next record at a greater offset.
pub fn parse_index(text: &str) -> HrrrResult<Vec<GribIndexRecord>> {
    let mut records = Vec::new();

    for (line_idx, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        records.push(decode_line(line_idx + 1, line)?);
    }

    backfill_ends(&mut records);

    debug!(records = records.len(), "Parsed GRIB index");
    Ok(records)
}

fn decode_line(line_number: usize, line: &str) -> HrrrResult<GribIndexRecord> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() <= LEVEL_FIELD {
        return Err(HrrrError::index_parse(
            line_number,
            format!("expected at least {} fields, found {}", LEVEL_FIELD + 1, fields.len()),
        ));
    }

    let start_byte = fields[OFFSET_FIELD].trim().parse::<u64>().map_err(|_| {
        HrrrError::index_parse(
            line_number,
            format!("invalid byte offset '{}'", fields[OFFSET_FIELD]),
        )
    })?;

    Ok(GribIndexRecord {
        record_number: fields[0].trim().to_string(),
        start_byte,
        end_byte: None,
        variable: fields[VARIABLE_FIELD].to_string(),
        level: fields[LEVEL_FIELD].to_string(),
        forecast: fields.get(FORECAST_FIELD).unwrap_or(&"").to_string(),
    })
}

fn backfill_ends(records: &mut [GribIndexRecord]) {
    // Start offset of the following group of messages, and of the current one
    let mut boundary: Option<u64> = None;
    let mut group_start: Option<u64> = None;

    for record in records.iter_mut().rev() {
        if group_start != Some(record.start_byte) {
            boundary = group_start;
            group_start = Some(record.start_byte);
        }
        record.end_byte = boundary.map(|start| start.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
1:0:d=2024011512:UGRD:10 m above ground:anl:
2:500:d=2024011512:VGRD:10 m above ground:anl:
3:900:d=2024011512:TMP:2 m above ground:anl:
";

    #[test]
    fn test_parse_sample() {
        let records = parse_index(SAMPLE).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].variable, "UGRD");
        assert_eq!(records[0].level, "10 m above ground");
        assert_eq!(records[0].forecast, "anl");
        assert_eq!(records[0].byte_range(), ByteRange::new(0, 499));
        assert_eq!(records[1].byte_range(), ByteRange::new(500, 899));
        assert!(records[2].is_open_ended());
        assert_eq!(records[2].byte_range(), ByteRange::to_end(900));
    }

    #[test]
    fn test_shared_offset_submessages() {
        let text = "\
50.1:1000:d=2024011512:UGRD:80 m above ground:anl:
50.2:1000:d=2024011512:VGRD:80 m above ground:anl:
51:1800:d=2024011512:TMP:surface:anl:
";
        let records = parse_index(text).unwrap();
        assert_eq!(records[0].end_byte, Some(1799));
        assert_eq!(records[1].end_byte, Some(1799));
        assert_eq!(records[2].end_byte, None);
    }

    #[test]
    fn test_missing_fields() {
        let err = parse_index("1:0:d=2024011512:UGRD\n").unwrap_err();
        assert!(matches!(err, HrrrError::IndexParse { line: 1, .. }));
    }

    #[test]
    fn test_non_numeric_offset() {
        let text = "1:0:d=2024011512:UGRD:10 m above ground:anl:\n2:abc:d=2024011512:VGRD:10 m above ground:anl:\n";
        let err = parse_index(text).unwrap_err();
        assert!(matches!(err, HrrrError::IndexParse { line: 2, .. }));
    }

    #[test]
    fn test_empty_index() {
        assert!(parse_index("").unwrap().is_empty());
        assert!(parse_index("\n\n").unwrap().is_empty());
    }
}
