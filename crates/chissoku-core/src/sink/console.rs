//! JSON-lines sink

use std::io::{self, Stdout, Write};

use super::{Sink, SinkError};
use crate::reading::Reading;

/// Writes each reading as one JSON object per line
pub struct ConsoleSink<W> {
    out: W,
}

impl ConsoleSink<Stdout> {
    /// Sink writing to standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Sink writing to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn name(&self) -> &'static str {
        "console"
    }

    fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.out, reading)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::FailurePolicy;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_console_writes_json_lines() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let mut sink = ConsoleSink::new(Vec::new());

        sink.write(&Reading::new(400, 50.0, 22.5, ts)).unwrap();
        sink.write(&Reading::new(401, 51.5, -1.0, ts)).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "{\"co2\":400,\"humidity\":50.0,\"temperature\":22.5,\"timestamp\":\"2024-05-06T07:08:09.000Z\"}\n\
             {\"co2\":401,\"humidity\":51.5,\"temperature\":-1.0,\"timestamp\":\"2024-05-06T07:08:09.000Z\"}\n"
        );
    }

    #[test]
    fn test_console_is_recoverable() {
        let sink = ConsoleSink::new(Vec::new());
        assert_eq!(sink.failure_policy(), FailurePolicy::LogAndContinue);
    }
}
