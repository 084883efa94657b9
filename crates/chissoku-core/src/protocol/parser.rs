//! Reading line parser
//!
//! Extracts `CO2=<int>,HUM=<float>,TMP=<float>` from free-form device
//! output. Numeric fields are parsed best-effort: a substring that matches
//! the pattern but does not parse (e.g. `1.2.3`) becomes zero.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::reading::Reading;

/// Prefix of the device's reply to `STP`
pub const SHUTDOWN_ACK_PREFIX: &str = "OK STP";

fn reading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"CO2=(\d+),HUM=([0-9.]+),TMP=([0-9.-]+)").expect("static pattern is valid")
    })
}

/// Classification of one line of device output
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// A measurement
    Reading(Reading),
    /// The device confirmed it stopped streaming
    ShutdownAck,
    /// Anything else; surfaced as a warning
    Unrecognized(String),
}

/// Classify `line`, stamping any reading with `now`
pub fn parse_line(line: &str, now: DateTime<Utc>) -> LineOutcome {
    if let Some(caps) = reading_pattern().captures(line) {
        let co2 = caps[1].parse().unwrap_or(0);
        let humidity = caps[2].parse().unwrap_or(0.0);
        let temperature = caps[3].parse().unwrap_or(0.0);
        return LineOutcome::Reading(Reading::new(co2, humidity, temperature, now));
    }

    if line.starts_with(SHUTDOWN_ACK_PREFIX) {
        LineOutcome::ShutdownAck
    } else {
        LineOutcome::Unrecognized(line.to_string())
    }
}
