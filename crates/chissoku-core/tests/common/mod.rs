//! Shared helpers: a scripted fake sensor and a recording sink

#![allow(dead_code)]

use chissoku_core::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::sync::mpsc;

/// Device side of an in-memory serial link
pub struct FakeDevice {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    write: WriteHalf<DuplexStream>,
}

impl FakeDevice {
    /// A connected (host, device) pair
    pub fn pair() -> (DuplexStream, FakeDevice) {
        init_tracing();
        let (host, device) = tokio::io::duplex(1024);
        let (read, write) = tokio::io::split(device);
        (
            host,
            FakeDevice {
                lines: BufReader::new(read).lines(),
                write,
            },
        )
    }

    /// Next command sent by the host, without `\r`
    pub async fn next_command(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(Some(line)) => Some(line.trim_end_matches('\r').to_string()),
            _ => None,
        }
    }

    pub async fn expect(&mut self, command: &str) {
        assert_eq!(self.next_command().await.as_deref(), Some(command));
    }

    pub async fn send(&mut self, text: &str) {
        self.write.write_all(text.as_bytes()).await.unwrap();
    }

    /// Acknowledge STP, ID? and STA
    pub async fn handshake(&mut self) {
        self.expect("STP").await;
        self.send("OK\r\n").await;
        self.expect("ID?").await;
        self.send("UD-CO2S 1.00\r\nOK ID=0001\r\n").await;
        self.expect("STA").await;
        self.send("OK STA\r\n").await;
    }
}

/// Forwards every emitted reading, optionally failing afterwards
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<Reading>,
    fail: Option<FailurePolicy>,
}

impl RecordingSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Reading>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, fail: None }, rx)
    }

    pub fn failing(policy: FailurePolicy) -> (Self, mpsc::UnboundedReceiver<Reading>) {
        let (mut sink, rx) = Self::new();
        sink.fail = Some(policy);
        (sink, rx)
    }
}

impl Sink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
        let _ = self.tx.send(reading.clone());
        match self.fail {
            Some(_) => Err(std::io::Error::other("sink unavailable").into()),
            None => Ok(()),
        }
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.fail.unwrap_or(FailurePolicy::LogAndContinue)
    }
}

/// Sink collecting into shared memory, for synchronous inspection
#[derive(Clone, Default)]
pub struct SharedSink {
    pub readings: Arc<Mutex<Vec<Reading>>>,
}

impl SharedSink {
    pub fn co2_values(&self) -> Vec<u64> {
        self.readings.lock().unwrap().iter().map(|r| r.co2).collect()
    }
}

impl Sink for SharedSink {
    fn name(&self) -> &'static str {
        "shared"
    }

    fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
        self.readings.lock().unwrap().push(reading.clone());
        Ok(())
    }
}

/// Route session logs to the test harness (`RUST_LOG=debug cargo test`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config() -> SessionConfig {
    SessionConfig {
        device: "fake".into(),
        read_timeout: Duration::from_secs(10),
        ..SessionConfig::default()
    }
}

pub fn reading(co2: u64) -> Reading {
    Reading::new(co2, 50.0, 20.0, chrono::Utc::now())
}
