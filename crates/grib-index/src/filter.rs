//! Variable/level selection for partial retrieval.
//!
//! Defines which GRIB2 messages are pulled out of each forecast file.

use serde::{Deserialize, Serialize};

use crate::parser::GribIndexRecord;

/// Standard level descriptions as they appear in HRRR inventories.
pub mod levels {
    /// 10 metre wind level
    pub const TEN_M_ABOVE_GROUND: &str = "10 m above ground";
    /// 2 metre temperature/humidity level
    pub const TWO_M_ABOVE_GROUND: &str = "2 m above ground";
    /// Surface
    pub const SURFACE: &str = "surface";
    /// Mean sea level
    pub const MEAN_SEA_LEVEL: &str = "mean sea level";
}

/// Selects index records by variable name and level description.
///
/// A record is selected when its variable is one of `variables` AND its level
/// is one of `levels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableFilter {
    pub variables: Vec<String>,
    pub levels: Vec<String>,
}

impl Default for VariableFilter {
    /// 10 m wind components.
    fn default() -> Self {
        Self {
            variables: vec!["UGRD".to_string(), "VGRD".to_string()],
            levels: vec![levels::TEN_M_ABOVE_GROUND.to_string()],
        }
    }
}

impl VariableFilter {
    pub fn new<V, L>(variables: V, levels: L) -> Self
    where
        V: IntoIterator,
        V::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
            levels: levels.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether a single record should be retrieved.
    pub fn matches(&self, record: &GribIndexRecord) -> bool {
        self.variables.iter().any(|v| v == &record.variable)
            && self.levels.iter().any(|l| l == &record.level)
    }

    /// Select matching records, preserving index order.
    pub fn select<'a>(&self, records: &'a [GribIndexRecord]) -> Vec<&'a GribIndexRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() || self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_index;

    #[test]
    fn test_default_is_10m_wind() {
        let filter = VariableFilter::default();
        assert_eq!(filter.variables, vec!["UGRD", "VGRD"]);
        assert_eq!(filter.levels, vec!["10 m above ground"]);
    }

    #[test]
    fn test_level_must_match_too() {
        let records = parse_index(
            "1:0:d=2024011512:UGRD:80 m above ground:anl:\n2:300:d=2024011512:UGRD:10 m above ground:anl:\n",
        )
        .unwrap();
        let selected = VariableFilter::default().select(&records);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].start_byte, 300);
    }
}
