//! Geographic regions used for clipping assembled output.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A named bounding box given by its north-west and south-east corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    #[serde(rename = "nw")]
    pub north_west: GeoPoint,
    #[serde(rename = "se")]
    pub south_east: GeoPoint,
}

impl Region {
    /// Create a new region from its corners.
    pub fn new(name: impl Into<String>, north_west: GeoPoint, south_east: GeoPoint) -> Self {
        Self {
            name: name.into(),
            north_west,
            south_east,
        }
    }

    /// Parse a region string: "name:nw_lat,nw_lon,se_lat,se_lon"
    pub fn from_arg(s: &str) -> Result<Self, RegionParseError> {
        let (name, coords) = s
            .split_once(':')
            .ok_or_else(|| RegionParseError::InvalidFormat(s.to_string()))?;

        let parts: Vec<&str> = coords.split(',').map(str::trim).collect();
        if name.is_empty() || parts.len() != 4 {
            return Err(RegionParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| RegionParseError::InvalidNumber(part.to_string()))?;
        }

        let region = Self::new(
            name,
            GeoPoint::new(values[0], values[1]),
            GeoPoint::new(values[2], values[3]),
        );
        region.validate()?;
        Ok(region)
    }

    /// Check that the corners describe a non-empty box.
    pub fn validate(&self) -> Result<(), RegionParseError> {
        if self.north_west.lat <= self.south_east.lat || self.north_west.lon >= self.south_east.lon {
            return Err(RegionParseError::InvertedCorners(self.name.clone()));
        }
        if !(-90.0..=90.0).contains(&self.north_west.lat)
            || !(-90.0..=90.0).contains(&self.south_east.lat)
        {
            return Err(RegionParseError::OutOfRange(self.name.clone()));
        }
        Ok(())
    }

    /// Longitude bound pair, west to east: "lon_min:lon_max"
    pub fn lon_bounds(&self) -> String {
        format!("{}:{}", self.north_west.lon, self.south_east.lon)
    }

    /// Latitude bound pair, south to north: "lat_min:lat_max"
    pub fn lat_bounds(&self) -> String {
        format!("{}:{}", self.south_east.lat, self.north_west.lat)
    }
}

/// Regions published when none are configured.
pub fn default_regions() -> Vec<Region> {
    vec![
        Region::new(
            "new-england",
            GeoPoint::new(42.0, -72.0),
            GeoPoint::new(41.0, -70.0),
        ),
        Region::new(
            "san-francisco",
            GeoPoint::new(38.0, -123.3),
            GeoPoint::new(36.5, -121.5),
        ),
        Region::new(
            "coastal-cup",
            GeoPoint::new(38.0, -123.3),
            GeoPoint::new(33.0, -120.0),
        ),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum RegionParseError {
    #[error("Invalid region format: {0}. Expected 'name:nw_lat,nw_lon,se_lat,se_lon'")]
    InvalidFormat(String),

    #[error("Invalid number in region: {0}")]
    InvalidNumber(String),

    #[error("Region '{0}' has its north-west corner south or east of its south-east corner")]
    InvertedCorners(String),

    #[error("Region '{0}' has a latitude outside -90..90")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region_arg() {
        let region = Region::from_arg("san-francisco:38,-123.3,36.5,-121.5").unwrap();
        assert_eq!(region.name, "san-francisco");
        assert_eq!(region.north_west, GeoPoint::new(38.0, -123.3));
        assert_eq!(region.south_east, GeoPoint::new(36.5, -121.5));
    }

    #[test]
    fn test_bounds_ordering() {
        let region = &default_regions()[0];
        assert_eq!(region.lon_bounds(), "-72:-70");
        assert_eq!(region.lat_bounds(), "41:42");
    }
}
