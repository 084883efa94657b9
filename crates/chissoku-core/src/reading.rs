//! Sensor readings

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// One structured sensor sample.
///
/// The timestamp is taken when the line is parsed, not reported by the
/// device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// CO2 concentration (ppm)
    pub co2: u64,
    /// Relative humidity (%)
    pub humidity: f64,
    /// Temperature (°C)
    pub temperature: f64,
    /// Wall-clock parse time
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Create a new reading
    pub fn new(co2: u64, humidity: f64, temperature: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            co2,
            humidity,
            temperature,
            timestamp,
        }
    }

    /// Timestamp as ISO 8601 with millisecond precision
    pub fn timestamp_text(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// `2006-01-02T15:04:05.000Z`
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts))
}
