//! Windowed dispatch
//!
//! Decouples the irregular stream of parsed readings from the fixed output
//! cadence. Only the most recent reading of each window is emitted; older
//! ones are dropped, so memory stays O(1) whatever the input rate.

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::OutputInterval;
use crate::reading::Reading;
use crate::sink::{FailurePolicy, Sink, SinkError};

/// Holds at most one pending reading
#[derive(Debug, Default)]
pub struct DispatchSlot {
    current: Option<Reading>,
}

impl DispatchSlot {
    /// Empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot, returning the superseded reading if any
    pub fn on_reading(&mut self, reading: Reading) -> Option<Reading> {
        self.current.replace(reading)
    }

    /// Take the pending reading for emission, leaving the slot empty
    pub fn on_tick(&mut self) -> Option<Reading> {
        self.current.take()
    }

    /// True when no reading is pending
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

/// Counters reported when the dispatcher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Readings accepted from the read loop
    pub received: u64,
    /// Readings written to the sink
    pub emitted: u64,
    /// Readings overwritten before their window closed
    pub superseded: u64,
    /// Ticks that found the slot empty
    pub empty_ticks: u64,
    /// Failed sink writes
    pub sink_errors: u64,
}

/// Emits at most one reading per interval tick
pub struct CoalescingDispatcher<S> {
    interval: OutputInterval,
    sink: S,
    slot: DispatchSlot,
    stats: DispatchStats,
}

impl<S: Sink> CoalescingDispatcher<S> {
    /// Dispatcher writing to `sink` once per `interval`
    pub fn new(interval: OutputInterval, sink: S) -> Self {
        Self {
            interval,
            sink,
            slot: DispatchSlot::new(),
            stats: DispatchStats::default(),
        }
    }

    /// Run until the reading channel closes.
    ///
    /// The first tick fires one interval after start. Returns early with the
    /// error if a `Fatal` sink fails.
    pub async fn run(mut self, mut readings: mpsc::Receiver<Reading>) -> Result<DispatchStats, SinkError> {
        let period = self.interval.as_duration();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(?period, sink = self.sink.name(), "dispatcher started");
        loop {
            tokio::select! {
                // Ticks fire at most once per period, so they cannot starve readings
                biased;
                _ = ticker.tick() => self.on_tick()?,
                reading = readings.recv() => match reading {
                    Some(reading) => self.on_reading(reading),
                    None => break,
                },
            }
        }
        tracing::debug!(stats = ?self.stats, "dispatcher stopped");
        Ok(self.stats)
    }

    fn on_reading(&mut self, reading: Reading) {
        self.stats.received += 1;
        if self.slot.on_reading(reading).is_some() {
            self.stats.superseded += 1;
        }
    }

    fn on_tick(&mut self) -> Result<(), SinkError> {
        let Some(reading) = self.slot.on_tick() else {
            self.stats.empty_ticks += 1;
            return Ok(());
        };

        match write_blocking(&mut self.sink, &reading) {
            Ok(()) => self.stats.emitted += 1,
            Err(e) => {
                self.stats.sink_errors += 1;
                match self.sink.failure_policy() {
                    FailurePolicy::Fatal => {
                        tracing::error!(sink = self.sink.name(), "write failed: {e}");
                        return Err(e);
                    }
                    FailurePolicy::LogAndContinue => {
                        tracing::warn!(sink = self.sink.name(), "write failed: {e}");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Sinks do synchronous I/O (stdout, SQLite). On a multi-threaded runtime the
/// worker is handed off first so other tasks keep running during the write;
/// `block_in_place` is not available on a current-thread runtime.
fn write_blocking<S: Sink>(sink: &mut S, reading: &Reading) -> Result<(), SinkError> {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(|| sink.write(reading)),
        _ => sink.write(reading),
    }
}
