use crate::{ActuatorChannel, ActuatorError};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Command bytes understood by the LED firmware.
const CMD_ON: &[u8] = b"1";
const CMD_OFF: &[u8] = b"0";

/// Actuator driven over a serial device opened as a file.
pub type SerialActuator = WriteActuator<File>;

/// Actuator that writes one ASCII command byte per state change.
///
/// A disconnected actuator rejects every command with
/// [`ActuatorError::Unavailable`]; callers keep running log-only.
pub struct WriteActuator<W: Write + Send> {
    writer: Option<W>,
    label: String,
}

impl WriteActuator<File> {
    /// Open a serial device node (already configured for the right baud rate).
    pub fn open(path: &Path) -> Result<Self, ActuatorError> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(ActuatorError::Open)?;
        info!(?path, "Actuator channel opened");
        Ok(Self::new(file, path.display().to_string()))
    }
}

impl<W: Write + Send> WriteActuator<W> {
    pub fn new(writer: W, label: impl Into<String>) -> Self {
        Self {
            writer: Some(writer),
            label: label.into(),
        }
    }

    /// An actuator with no device behind it.
    pub fn disconnected() -> Self {
        Self {
            writer: None,
            label: "disconnected".to_string(),
        }
    }
}

impl<W: Write + Send> ActuatorChannel for WriteActuator<W> {
    fn set(&mut self, state: bool) -> Result<(), ActuatorError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(ActuatorError::Unavailable);
        };
        let command = if state { CMD_ON } else { CMD_OFF };
        writer
            .write_all(command)
            .and_then(|_| writer.flush())
            .map_err(ActuatorError::Write)?;
        info!(channel = %self.label, state, "Actuator command sent");
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.writer.is_some()
    }
}
