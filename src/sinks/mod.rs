//! Sink implementations

pub mod console;
pub mod file;
pub mod json;
pub mod memory;

pub use console::ConsoleSink;
pub use file::FileSink;
pub use json::JsonSink;
pub use memory::{MemoryHandle, MemorySink};

pub use crate::core::Sink;

use crate::core::{sanitize_message, Event};
use std::fmt::Write;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Everything after the level column of a text line
pub(crate) fn format_body(event: &Event) -> String {
    let mut line = String::with_capacity(event.template().len() + 48);
    let _ = write!(line, "[{}]", event.thread_label());
    if let Some(target) = event.target() {
        let _ = write!(line, " {}", target);
    }
    if let Some(marker) = event.marker() {
        let _ = write!(line, " <{}>", marker);
    }
    let _ = write!(line, " - {}", sanitize_message(&event.render()));

    if let Some(context) = event.context() {
        if !context.is_empty() {
            let _ = write!(line, " | {}", context.format_fields());
        }
    }
    if let Some(error) = event.error() {
        let _ = write!(line, " | error: {}", sanitize_message(&error.to_string()));
    }
    line
}

pub(crate) fn format_timestamp(event: &Event) -> String {
    event.timestamp().format(TIMESTAMP_FORMAT).to_string()
}

/// One plain text line, without trailing newline
pub(crate) fn format_line(event: &Event) -> String {
    format!(
        "[{}] [{:5}] {}",
        format_timestamp(event),
        event.level().to_str(),
        format_body(event)
    )
}
