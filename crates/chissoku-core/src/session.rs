//! Session lifecycle
//!
//! Runs the handshake, streams readings into the dispatcher, and drains the
//! device on shutdown. Shutdown is cooperative: cancelling the token makes
//! the read loop send `STP` once, after which the session ends when the
//! device answers `OK STP`.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, SessionConfig};
use crate::dispatch::{CoalescingDispatcher, DispatchStats};
use crate::protocol::{
    open_serial, parse_line, Handshake, LineChannel, LineOutcome, ProtocolError, TransportError,
    CMD_STOP,
};
use crate::reading::Reading;
use crate::sink::{Sink, SinkError};

/// Parsed readings buffered between the read loop and the dispatcher
const READING_QUEUE_DEPTH: usize = 32;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// Handshake in progress
    Initializing,
    /// Device is streaming readings
    Streaming,
    /// Stop requested, waiting for the device to confirm
    Draining,
    /// Transport released
    Terminated,
}

impl SessionState {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Initializing, Streaming)
                | (Initializing, Terminated)
                | (Streaming, Draining)
                | (Streaming, Terminated)
                | (Draining, Terminated)
        )
    }
}

/// How a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The device acknowledged `STP`
    Stopped,
    /// The transport reached end of stream
    EndOfStream,
}

/// Fatal session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Handshake failed: {0}")]
    Handshake(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Dispatcher task failed: {0}")]
    Dispatcher(#[from] JoinError),
}

type DispatchResult = Result<Result<DispatchStats, SinkError>, JoinError>;

/// Why the read loop stopped
enum LoopExit {
    ShutdownAck,
    EndOfStream,
    Transport(TransportError),
    /// The dispatcher finished on its own, which only happens on a fatal sink error
    Dispatcher(DispatchResult),
}

/// Drives one device session from handshake to teardown
pub struct SessionController {
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    shutdown: CancellationToken,
}

impl SessionController {
    /// Validate the configuration; no I/O happens here
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (state, _) = watch::channel(SessionState::Initializing);
        Ok(Self {
            config,
            state,
            shutdown: CancellationToken::new(),
        })
    }

    /// The validated configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Token that requests a graceful stop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn transition(&self, next: SessionState) {
        let current = self.state();
        if !current.can_transition_to(next) {
            tracing::debug!(?current, ?next, "ignoring state transition");
            return;
        }
        tracing::debug!(from = ?current, to = ?next, "session state");
        self.state.send_replace(next);
    }

    /// Open the configured serial device and run the session on it
    pub async fn run_serial<S>(self, sink: S) -> Result<SessionOutcome, SessionError>
    where
        S: Sink + 'static,
    {
        let port = match open_serial(&self.config.device, self.config.baud_rate) {
            Ok(port) => port,
            Err(e) => {
                self.transition(SessionState::Terminated);
                return Err(e.into());
            }
        };
        self.run(port, sink).await
    }

    /// Run the full session over an already opened transport
    pub async fn run<T, S>(self, io: T, sink: S) -> Result<SessionOutcome, SessionError>
    where
        T: AsyncRead + AsyncWrite,
        S: Sink + 'static,
    {
        let mut channel = LineChannel::new(io, self.config.read_timeout);

        let handshake = Handshake::new(self.config.settle_delay);
        if let Err(e) = handshake.initialize(&mut channel).await {
            if let Err(close_err) = channel.close().await {
                tracing::debug!("close after failed handshake: {close_err}");
            }
            self.transition(SessionState::Terminated);
            return Err(e.into());
        }
        self.transition(SessionState::Streaming);

        let (tx, rx) = mpsc::channel(READING_QUEUE_DEPTH);
        let dispatcher = CoalescingDispatcher::new(self.config.interval, sink);
        let mut dispatcher = tokio::spawn(dispatcher.run(rx));

        let exit = self.read_loop(&mut channel, &tx, &mut dispatcher).await;
        drop(tx);

        self.teardown(channel).await;

        let (exit, dispatched) = match exit {
            LoopExit::Dispatcher(result) => (None, result),
            other => (Some(other), dispatcher.await),
        };
        let dispatch_error = match dispatched {
            Ok(Ok(stats)) => {
                tracing::info!(
                    emitted = stats.emitted,
                    superseded = stats.superseded,
                    "session finished"
                );
                None
            }
            Ok(Err(e)) => Some(SessionError::Sink(e)),
            Err(e) => Some(SessionError::Dispatcher(e)),
        };

        match (exit, dispatch_error) {
            (Some(LoopExit::Transport(e)), _) => Err(e.into()),
            (_, Some(e)) => Err(e),
            (Some(LoopExit::ShutdownAck), None) => Ok(SessionOutcome::Stopped),
            _ => Ok(SessionOutcome::EndOfStream),
        }
    }

    async fn read_loop<T>(
        &self,
        channel: &mut LineChannel<T>,
        tx: &mpsc::Sender<Reading>,
        dispatcher: &mut JoinHandle<Result<DispatchStats, SinkError>>,
    ) -> LoopExit
    where
        T: AsyncRead + AsyncWrite,
    {
        let shutdown = self.shutdown.clone();
        loop {
            let streaming = self.state() == SessionState::Streaming;
            tokio::select! {
                biased;
                result = &mut *dispatcher => return LoopExit::Dispatcher(result),
                _ = shutdown.cancelled(), if streaming => {
                    tracing::info!("Stopping device...");
                    self.transition(SessionState::Draining);
                    if let Err(e) = channel.send_command(CMD_STOP).await {
                        tracing::error!("stop command failed: {e}");
                        return LoopExit::Transport(e);
                    }
                }
                line = channel.read_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            tracing::info!("Device closed the stream");
                            return LoopExit::EndOfStream;
                        }
                        // A quiet device is not an error; look at the other arms again
                        Err(TransportError::ReadTimeout(after)) => {
                            tracing::debug!(?after, "no line yet");
                            continue;
                        }
                        Err(e) => {
                            tracing::error!("{e}");
                            return LoopExit::Transport(e);
                        }
                    };
                    match parse_line(&line, Utc::now()) {
                        LineOutcome::Reading(reading) => {
                            tracing::trace!(co2 = reading.co2, "reading");
                            if tx.send(reading).await.is_err() {
                                tracing::debug!("dispatcher gone, reading dropped");
                            }
                        }
                        LineOutcome::ShutdownAck => {
                            tracing::info!("Device stopped");
                            self.transition(SessionState::Draining);
                            return LoopExit::ShutdownAck;
                        }
                        LineOutcome::Unrecognized(text) => {
                            tracing::warn!("Read unmatched string: {text}");
                        }
                    }
                }
            }
        }
    }

    /// Stop the device (again, harmlessly, if already stopped) and release it
    async fn teardown<T>(&self, mut channel: LineChannel<T>)
    where
        T: AsyncRead + AsyncWrite,
    {
        if let Err(e) = channel.send_command(CMD_STOP).await {
            tracing::debug!("stop command on teardown failed: {e}");
        }
        tokio::time::sleep(self.config.settle_delay).await;
        if let Err(e) = channel.close().await {
            tracing::debug!("close failed: {e}");
        }
        self.transition(SessionState::Terminated);
    }
}
