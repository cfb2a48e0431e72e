use crate::{LogRow, RecorderError, SampleRecorder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

const HEADER: &str = "Time (s),Frame,X,Y,Z,LED State";

/// Result of flushing the recorder to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// No rows were recorded; no file was written.
    NothingToSave,
    /// Recording is turned off.
    Disabled,
    Saved { path: PathBuf, rows: usize },
}

/// Collects rows in memory and writes them as CSV at shutdown.
#[derive(Debug, Default)]
pub struct CsvRecorder {
    rows: Vec<LogRow>,
    path: Option<PathBuf>,
}

impl CsvRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            rows: Vec::new(),
            path: Some(path.into()),
        }
    }

    /// A recorder that keeps nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Write all rows to the output file. Rows are kept, so a later flush
    /// rewrites the full session.
    pub fn flush(&self) -> Result<FlushOutcome, RecorderError> {
        let Some(path) = &self.path else {
            return Ok(FlushOutcome::Disabled);
        };
        if self.rows.is_empty() {
            info!("No data recorded, nothing to save");
            return Ok(FlushOutcome::NothingToSave);
        }

        let io_err = |source| RecorderError::Io {
            path: path.display().to_string(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut out = BufWriter::new(file);
        write_csv(&mut out, &self.rows).map_err(io_err)?;
        out.flush().map_err(io_err)?;

        info!(?path, rows = self.rows.len(), "Recorded samples saved");
        Ok(FlushOutcome::Saved {
            path: path.clone(),
            rows: self.rows.len(),
        })
    }
}

impl SampleRecorder for CsvRecorder {
    fn append(&mut self, row: LogRow) {
        if self.path.is_some() {
            self.rows.push(row);
        }
    }

    fn clear(&mut self) {
        self.rows.clear();
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Write the header and one line per row.
pub fn write_csv<W: Write>(out: &mut W, rows: &[LogRow]) -> std::io::Result<()> {
    writeln!(out, "{HEADER}")?;
    for row in rows {
        writeln!(
            out,
            "{},{},{},{},{},{}",
            row.relative_time,
            row.relative_frame,
            row.position.x,
            row.position.y,
            row.position.z,
            u8::from(row.actuator_state)
        )?;
    }
    Ok(())
}
