//! Session configuration

use std::time::Duration;
use thiserror::Error;

use crate::protocol::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT, DEFAULT_SETTLE_DELAY};

/// Invalid configuration, detected before any I/O
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("interval must be a positive number of seconds, got {0}")]
    NonPositiveInterval(i64),

    #[error("no serial device specified")]
    MissingDevice,

    #[error("no output selected: stdout is disabled and no database is configured")]
    NoSink,
}

/// Length of one output window, always at least one second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputInterval(Duration);

impl OutputInterval {
    /// Interval of `secs` seconds; zero or negative is rejected
    pub fn from_secs(secs: i64) -> Result<Self, ConfigError> {
        if secs <= 0 {
            return Err(ConfigError::NonPositiveInterval(secs));
        }
        Ok(Self(Duration::from_secs(secs as u64)))
    }

    /// Window length
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl Default for OutputInterval {
    fn default() -> Self {
        Self(Duration::from_secs(1))
    }
}

/// Everything the session needs to talk to one device
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Serial device path (e.g. "/dev/ttyACM0")
    pub device: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Output window
    pub interval: OutputInterval,
    /// Bound on a single line read
    pub read_timeout: Duration,
    /// Pause after a command before reading its reply, and before close
    pub settle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            interval: OutputInterval::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl SessionConfig {
    /// Build a config from raw user input
    pub fn new(device: Option<String>, interval_secs: i64) -> Result<Self, ConfigError> {
        let config = Self {
            device: device.unwrap_or_default(),
            interval: OutputInterval::from_secs(interval_secs)?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check fields that are not enforced by their types
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.trim().is_empty() {
            return Err(ConfigError::MissingDevice);
        }
        Ok(())
    }
}
