//! File sink implementation

use super::format_line;
use crate::core::{Event, RelayError, Result, Sink};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends one text line per event to a file
///
/// The file is opened (created if missing) on `start`, or eagerly with
/// [`FileSink::open`]. Writes are buffered and flushed whenever the relay's
/// queue runs empty and on `stop`.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Create a sink for `path`; the file is opened on `start`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    /// Create a sink and open its file immediately
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut sink = Self::new(path);
        sink.start()?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn start(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                RelayError::io_operation(
                    "opening log file",
                    format!("cannot open '{}'", self.path.display()),
                    e,
                )
            })?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn dispatch(&mut self, event: &Event) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            RelayError::sink("file", format!("'{}' is not open", self.path.display()))
        })?;

        let mut output = format_line(event);
        output.push('\n');
        writer.write_all(output.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = self.flush();
    }
}
