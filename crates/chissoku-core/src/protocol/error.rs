//! Protocol errors

use thiserror::Error;

/// Failures of the physical byte channel
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("No line received within {0:?}")]
    ReadTimeout(std::time::Duration),

    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serialport::Error> for TransportError {
    fn from(e: serialport::Error) -> Self {
        TransportError::SerialError(e.to_string())
    }
}

/// Errors raised while bringing the device into streaming mode
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("command `{command}` failed: {response}")]
    Rejected { command: String, response: String },

    #[error("command `{command}`: device closed the stream before acknowledging")]
    UnexpectedEof { command: String },

    #[error("command `{command}`: {source}")]
    Transport {
        command: String,
        #[source]
        source: TransportError,
    },
}

impl ProtocolError {
    /// The handshake command that was in flight when the error occurred
    pub fn command(&self) -> &str {
        match self {
            ProtocolError::Rejected { command, .. }
            | ProtocolError::UnexpectedEof { command }
            | ProtocolError::Transport { command, .. } => command,
        }
    }
}
