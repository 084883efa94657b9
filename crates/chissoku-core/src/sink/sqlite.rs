//! SQLite sink

use rusqlite::{params, Connection};
use std::path::Path;

use super::{FailurePolicy, Sink, SinkError};
use crate::reading::Reading;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS readings (
    co2         INTEGER NOT NULL,
    humidity    REAL NOT NULL,
    temperature REAL NOT NULL,
    timestamp   TEXT NOT NULL
);
";

/// Inserts one row per reading into a `readings` table
pub struct SqliteSink {
    connection: Connection,
}

impl SqliteSink {
    /// Open (or create) the database and ensure the table exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        Self::initialize(Connection::open(path)?)
    }

    /// Database that lives only as long as the sink
    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(connection: Connection) -> Result<Self, SinkError> {
        connection.execute_batch(SCHEMA)?;
        Ok(Self { connection })
    }

    /// Number of stored rows
    pub fn count(&self) -> Result<u64, SinkError> {
        let n: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

impl Sink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
        self.connection
            .prepare_cached(
                "INSERT INTO readings (co2, humidity, temperature, timestamp) VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![
                reading.co2,
                reading.humidity,
                reading.temperature,
                reading.timestamp_text(),
            ])?;
        Ok(())
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }
}
