pub mod csv;
pub mod serial;

use glam::DVec3;
use thiserror::Error;

pub use csv::{CsvRecorder, FlushOutcome};
pub use serial::{SerialActuator, WriteActuator};

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("Actuator channel is not open")]
    Unavailable,
    #[error("Failed to open actuator channel: {0}")]
    Open(#[source] std::io::Error),
    #[error("Failed to write actuator command: {0}")]
    Write(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Sink for binary actuator commands (LED, relay, GPIO line).
pub trait ActuatorChannel: Send {
    /// Drive the actuator on (`true`) or off (`false`).
    fn set(&mut self, state: bool) -> Result<(), ActuatorError>;

    /// Whether commands can currently reach the device.
    fn is_available(&self) -> bool;
}

/// One recorded row per live sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRow {
    /// Seconds since the session started.
    pub relative_time: f64,
    /// Frames since the session started.
    pub relative_frame: i64,
    pub position: DVec3,
    pub actuator_state: bool,
}

/// Append-only store of rows for the current session.
pub trait SampleRecorder {
    fn append(&mut self, row: LogRow);

    /// Drop all rows (a new session has started).
    fn clear(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SampleRecorder for Vec<LogRow> {
    fn append(&mut self, row: LogRow) {
        self.push(row);
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}
