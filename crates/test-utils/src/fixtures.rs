//! Synthetic HRRR objects for tests.
//!
//! Builds GRIB2-shaped payloads together with a matching `.idx` inventory so
//! ranged retrieval can be exercised without touching the real bucket.

/// One message in a synthetic GRIB2 file.
#[derive(Debug, Clone, Copy)]
pub struct FixtureMessage {
    pub variable: &'static str,
    pub level: &'static str,
    pub size: usize,
}

impl FixtureMessage {
    pub const fn new(variable: &'static str, level: &'static str, size: usize) -> Self {
        Self {
            variable,
            level,
            size,
        }
    }
}

/// A subset of a real HRRR surface file inventory, in file order.
pub fn hrrr_surface_messages() -> Vec<FixtureMessage> {
    vec![
        FixtureMessage::new("TMP", "2 m above ground", 120),
        FixtureMessage::new("UGRD", "10 m above ground", 64),
        FixtureMessage::new("VGRD", "10 m above ground", 72),
        FixtureMessage::new("GUST", "surface", 40),
        FixtureMessage::new("UGRD", "80 m above ground", 56),
        FixtureMessage::new("PRMSL", "mean sea level", 48),
    ]
}

/// A synthetic data object and its index text.
#[derive(Debug, Clone)]
pub struct GribFixture {
    pub index: String,
    pub data: Vec<u8>,
    /// Start offset of each message
    pub offsets: Vec<usize>,
}

impl GribFixture {
    /// Build a file for `reference` ("YYYYMMDDHH") at `forecast_hour`.
    ///
    /// Message bytes start with "GRIB", then the forecast hour and message
    /// number, so every message of every hour is distinguishable.
    pub fn build(reference: &str, forecast_hour: u32, messages: &[FixtureMessage]) -> Self {
        let forecast = if forecast_hour == 0 {
            "anl".to_string()
        } else {
            format!("{} hour fcst", forecast_hour)
        };

        let mut index = String::new();
        let mut data = Vec::new();
        let mut offsets = Vec::new();

        for (i, message) in messages.iter().enumerate() {
            offsets.push(data.len());
            index.push_str(&format!(
                "{}:{}:d={}:{}:{}:{}:\n",
                i + 1,
                data.len(),
                reference,
                message.variable,
                message.level,
                forecast
            ));

            let mut bytes = format!("GRIB{:02}{:03}", forecast_hour, i + 1).into_bytes();
            let fill = b'a' + (i % 26) as u8;
            bytes.resize(message.size.max(bytes.len()), fill);
            data.extend_from_slice(&bytes);
        }

        Self {
            index,
            data,
            offsets,
        }
    }

    /// Raw bytes of message `i` (0-based).
    pub fn message_bytes(&self, i: usize) -> &[u8] {
        let start = self.offsets[i];
        let end = self.offsets.get(i + 1).copied().unwrap_or(self.data.len());
        &self.data[start..end]
    }

    /// Concatenated bytes of the messages matching `variables` at `level`, in file order.
    pub fn selected_bytes(&self, messages: &[FixtureMessage], variables: &[&str], level: &str) -> Vec<u8> {
        messages
            .iter()
            .enumerate()
            .filter(|(_, m)| variables.contains(&m.variable) && m.level == level)
            .flat_map(|(i, _)| self.message_bytes(i).to_vec())
            .collect()
    }
}
