//! Output sinks
//!
//! Where coalesced readings go: a JSON line on stdout, a row in SQLite, or
//! both at once.

mod console;
mod sqlite;

pub use console::ConsoleSink;
pub use sqlite::SqliteSink;

use thiserror::Error;

use crate::reading::Reading;

/// Errors raised while writing a reading downstream
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// What the dispatcher does when a sink write fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the error and keep dispatching
    LogAndContinue,
    /// Stop the session; losing data silently is not acceptable
    Fatal,
}

/// Destination for emitted readings
pub trait Sink: Send {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    /// Deliver one reading
    fn write(&mut self, reading: &Reading) -> Result<(), SinkError>;

    /// How failures of this sink are treated
    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::LogAndContinue
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
        (**self).write(reading)
    }

    fn failure_policy(&self) -> FailurePolicy {
        (**self).failure_policy()
    }
}

/// Writes every reading to several sinks.
///
/// Failures of `LogAndContinue` members are logged here and swallowed, so
/// any error this returns comes from a `Fatal` member.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn Sink>>,
}

impl FanOut {
    /// Fan-out with no members
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member sink
    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    /// True when no member sink is configured
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Number of member sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }
}

impl Sink for FanOut {
    fn name(&self) -> &'static str {
        "fan-out"
    }

    fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
        let mut fatal = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.write(reading) {
                match sink.failure_policy() {
                    FailurePolicy::Fatal if fatal.is_none() => fatal = Some(e),
                    FailurePolicy::Fatal => {
                        tracing::error!(sink = sink.name(), "write failed: {e}")
                    }
                    FailurePolicy::LogAndContinue => {
                        tracing::warn!(sink = sink.name(), "write failed: {e}")
                    }
                }
            }
        }
        fatal.map_or(Ok(()), Err)
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    struct Recording {
        seen: Arc<Mutex<Vec<u64>>>,
        fail: Option<FailurePolicy>,
    }

    impl Sink for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
            self.seen.lock().unwrap().push(reading.co2);
            match self.fail {
                Some(_) => Err(std::io::Error::other("boom").into()),
                None => Ok(()),
            }
        }

        fn failure_policy(&self) -> FailurePolicy {
            self.fail.unwrap_or(FailurePolicy::LogAndContinue)
        }
    }

    fn recording(fail: Option<FailurePolicy>) -> (Box<dyn Sink>, Arc<Mutex<Vec<u64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Recording {
                seen: seen.clone(),
                fail,
            }),
            seen,
        )
    }

    #[test]
    fn test_fan_out_swallows_recoverable_errors() {
        let (flaky, flaky_seen) = recording(Some(FailurePolicy::LogAndContinue));
        let (ok, ok_seen) = recording(None);
        let mut fan = FanOut::new();
        fan.push(flaky);
        fan.push(ok);

        fan.write(&Reading::new(500, 40.0, 20.0, Utc::now())).unwrap();

        assert_eq!(*flaky_seen.lock().unwrap(), vec![500]);
        assert_eq!(*ok_seen.lock().unwrap(), vec![500]);
    }

    #[test]
    fn test_fan_out_reports_fatal_after_writing_all() {
        let (store, _) = recording(Some(FailurePolicy::Fatal));
        let (ok, ok_seen) = recording(None);
        let mut fan = FanOut::new();
        fan.push(store);
        fan.push(ok);

        assert!(fan.write(&Reading::new(500, 40.0, 20.0, Utc::now())).is_err());
        assert_eq!(*ok_seen.lock().unwrap(), vec![500]);
        assert_eq!(fan.failure_policy(), FailurePolicy::Fatal);
    }
}
