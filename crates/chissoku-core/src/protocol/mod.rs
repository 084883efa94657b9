//! Device Session Protocol
//!
//! Implements the line-oriented ASCII protocol spoken by the CO2 sensor.
//!
//! Commands are sent as `<CMD>\r\n`; the device answers with `OK...` or
//! `NG...` and, once streaming, emits one `CO2=..,HUM=..,TMP=..` line per
//! measurement.

mod channel;
mod error;
pub mod handshake;
pub mod parser;
pub mod serial;

pub use channel::{DeviceLineCodec, LineChannel};
pub use error::{ProtocolError, TransportError};
pub use handshake::{Handshake, HandshakeStep, HANDSHAKE_SEQUENCE};
pub use parser::{parse_line, LineOutcome};
pub use serial::{list_ports, open_serial, PortInfo};

use std::time::Duration;

/// Stop streaming
pub const CMD_STOP: &str = "STP";

/// Query device identity
pub const CMD_IDENTIFY: &str = "ID?";

/// Start streaming
pub const CMD_START: &str = "STA";

/// Command terminator expected by the device
pub const LINE_TERMINATOR: &str = "\r\n";

/// Default baud rate for the sensor
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default bound on a single line read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay after a command before reading its response, and before closing
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Maximum accepted line length in bytes
pub const MAX_LINE_LENGTH: usize = 4096;
