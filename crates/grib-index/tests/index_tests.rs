//! Tests for index parsing and record selection against synthetic inventories.

use grib_index::{index_key, parse_index, VariableFilter};
use hrrr_common::ByteRange;
use test_utils::{hrrr_surface_messages, FixtureMessage, GribFixture};

// ============================================================================
// End-byte backfill
// ============================================================================

#[test]
fn test_every_record_ends_before_the_next() {
    for count in [1usize, 2, 7, 40] {
        let messages: Vec<FixtureMessage> = (0..count)
            .map(|i| FixtureMessage::new("TMP", "surface", 10 + i * 3))
            .collect();
        let fixture = GribFixture::build("2024011500", 1, &messages);
        let records = parse_index(&fixture.index).unwrap();

        assert_eq!(records.len(), count);
        for pair in records.windows(2) {
            assert_eq!(pair[0].end_byte, Some(pair[1].start_byte - 1));
        }
        assert_eq!(records.last().unwrap().end_byte, None);
    }
}

#[test]
fn test_offsets_match_fixture() {
    let messages = hrrr_surface_messages();
    let fixture = GribFixture::build("2024011512", 6, &messages);
    let records = parse_index(&fixture.index).unwrap();

    for (record, offset) in records.iter().zip(&fixture.offsets) {
        assert_eq!(record.start_byte, *offset as u64);
    }
    assert_eq!(records[0].forecast, "6 hour fcst");
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_single_variable_range() {
    let text = "\
1:0:d=2024011512:UGRD:10 m above ground:anl:
2:500:d=2024011512:VGRD:10 m above ground:anl:
3:900:d=2024011512:TMP:2 m above ground:anl:
";
    let records = parse_index(text).unwrap();
    let filter = VariableFilter::new(["UGRD"], ["10 m above ground"]);
    let selected = filter.select(&records);

    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].byte_range(), ByteRange::new(0, 499));
}

#[test]
fn test_wind_selection_preserves_order() {
    let messages = hrrr_surface_messages();
    let fixture = GribFixture::build("2024011512", 0, &messages);
    let records = parse_index(&fixture.index).unwrap();
    let selected = VariableFilter::default().select(&records);

    let names: Vec<&str> = selected.iter().map(|r| r.variable.as_str()).collect();
    assert_eq!(names, vec!["UGRD", "VGRD"]);
    assert_eq!(selected[0].byte_range(), ByteRange::new(120, 183));
    assert_eq!(selected[1].byte_range(), ByteRange::new(184, 255));
}

#[test]
fn test_final_record_is_open_ended() {
    let messages = hrrr_surface_messages();
    let fixture = GribFixture::build("2024011512", 0, &messages);
    let records = parse_index(&fixture.index).unwrap();
    let filter = VariableFilter::new(["PRMSL"], ["mean sea level"]);
    let selected = filter.select(&records);

    assert_eq!(selected.len(), 1);
    assert!(selected[0].is_open_ended());
    let range = selected[0].byte_range().resolve(fixture.data.len() as u64);
    assert_eq!(range.end as usize, fixture.data.len());
}

#[test]
fn test_empty_filter_selects_nothing() {
    let messages = hrrr_surface_messages();
    let fixture = GribFixture::build("2024011512", 0, &messages);
    let records = parse_index(&fixture.index).unwrap();
    let filter = VariableFilter::new(Vec::<String>::new(), ["surface"]);

    assert!(filter.is_empty());
    assert!(filter.select(&records).is_empty());
}

#[test]
fn test_index_key() {
    assert_eq!(
        index_key("hrrr.20240115/conus/hrrr.t12z.wrfsfcf06.grib2"),
        "hrrr.20240115/conus/hrrr.t12z.wrfsfcf06.grib2.idx"
    );
}
