//! Initialization handshake
//!
//! Brings the device into a known streaming state by sending `STP`, `ID?`
//! and `STA` in order, each of which must be acknowledged with `OK` before
//! the next is sent.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{LineChannel, ProtocolError, CMD_IDENTIFY, CMD_START, CMD_STOP, DEFAULT_SETTLE_DELAY};

/// Device reply to a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// `OK...`
    Ack,
    /// `NG...`
    Nack,
}

/// One command of the startup sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeStep {
    /// Command text without terminator
    pub command: &'static str,
}

impl HandshakeStep {
    /// Classify a response line; `None` for lines that are neither `OK` nor `NG`
    pub fn classify(&self, line: &str) -> Option<Acknowledgement> {
        if line.starts_with("OK") {
            Some(Acknowledgement::Ack)
        } else if line.starts_with("NG") {
            Some(Acknowledgement::Nack)
        } else {
            None
        }
    }
}

/// Stop any running stream, identify, then start streaming
pub const HANDSHAKE_SEQUENCE: [HandshakeStep; 3] = [
    HandshakeStep { command: CMD_STOP },
    HandshakeStep { command: CMD_IDENTIFY },
    HandshakeStep { command: CMD_START },
];

/// Drives the startup command sequence
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Pause between writing a command and reading its reply.
    /// The device gives no readiness signal; this is a fixed guess.
    settle_delay: Duration,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY)
    }
}

impl Handshake {
    /// Handshake waiting `settle_delay` after each command
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }

    /// Run every step in order, stopping at the first failure
    pub async fn initialize<T>(&self, channel: &mut LineChannel<T>) -> Result<(), ProtocolError>
    where
        T: AsyncRead + AsyncWrite,
    {
        tracing::info!("Preparing device...");
        for step in &HANDSHAKE_SEQUENCE {
            self.run_step(channel, step).await?;
            tracing::debug!(command = step.command, "acknowledged");
        }
        tracing::info!("Device ready");
        Ok(())
    }

    async fn run_step<T>(
        &self,
        channel: &mut LineChannel<T>,
        step: &HandshakeStep,
    ) -> Result<(), ProtocolError>
    where
        T: AsyncRead + AsyncWrite,
    {
        let transport = |source| ProtocolError::Transport {
            command: step.command.to_string(),
            source,
        };

        channel.send_command(step.command).await.map_err(transport)?;
        tokio::time::sleep(self.settle_delay).await;

        loop {
            let line = channel.read_line().await.map_err(transport)?;
            let Some(line) = line else {
                return Err(ProtocolError::UnexpectedEof {
                    command: step.command.to_string(),
                });
            };
            match step.classify(&line) {
                Some(Acknowledgement::Ack) => return Ok(()),
                Some(Acknowledgement::Nack) => {
                    return Err(ProtocolError::Rejected {
                        command: step.command.to_string(),
                        response: line,
                    })
                }
                // Stale readings and identity text
                None => continue,
            }
        }
    }
}
