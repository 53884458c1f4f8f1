//! JSON lines sink for structured output

use crate::core::{Event, RelayError, Result, Sink};
use serde::Serialize;
use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Serialize)]
struct JsonLine<'a> {
    message: Cow<'a, str>,
    #[serde(flatten)]
    event: &'a Event,
}

/// Writes each event as a single-line JSON object (JSONL)
///
/// The object carries the rendered `message` next to the event's own fields
/// (level, template, args, target, marker, error, context, ...).
pub struct JsonSink<W: Write + Send = BufWriter<File>> {
    writer: W,
    pretty: bool,
}

impl JsonSink<BufWriter<File>> {
    /// Append to the file at `path`, creating it if missing
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                RelayError::io_operation(
                    "opening JSON log file",
                    format!("cannot open '{}'", path.display()),
                    e,
                )
            })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pretty: false,
        }
    }

    /// Pretty-print each object (no longer one object per line)
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Sink for JsonSink<W> {
    fn dispatch(&mut self, event: &Event) -> Result<()> {
        let line = JsonLine {
            message: event.render(),
            event,
        };
        let json = if self.pretty {
            serde_json::to_string_pretty(&line)?
        } else {
            serde_json::to_string(&line)?
        };

        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "json"
    }
}
