//! # Chissoku Core Library
//!
//! Device session and windowed dispatch for line-oriented CO2 sensors.

#![warn(missing_docs)]

//!
//! This library provides:
//! - A line-framed channel over the sensor's serial port
//! - The startup handshake (`STP`, `ID?`, `STA`)
//! - Parsing of `CO2=..,HUM=..,TMP=..` reading lines
//! - A coalescing dispatcher emitting at most one reading per interval
//! - Console (JSON lines) and SQLite sinks
//! - The session controller tying it together, with graceful shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use chissoku_core::prelude::*;
//!
//! let config = SessionConfig::new(Some("/dev/ttyACM0".into()), 1)?;
//! let controller = SessionController::new(config)?;
//! let stop = controller.shutdown_token();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     stop.cancel();
//! });
//! controller.run_serial(ConsoleSink::stdout()).await?;
//! ```

pub mod config;
pub mod dispatch;
pub mod protocol;
pub mod reading;
pub mod session;
pub mod sink;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigError, OutputInterval, SessionConfig};
    pub use crate::dispatch::{CoalescingDispatcher, DispatchSlot, DispatchStats};
    pub use crate::protocol::{LineChannel, LineOutcome, ProtocolError, TransportError};
    pub use crate::reading::Reading;
    pub use crate::session::{SessionController, SessionError, SessionOutcome, SessionState};
    pub use crate::sink::{ConsoleSink, FailurePolicy, FanOut, Sink, SinkError, SqliteSink};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
