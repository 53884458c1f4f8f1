//! Sink trait for event output destinations

use super::{error::Result, event::Event};

/// A downstream consumer that performs the actual output for an event
///
/// A relay starts its sinks before it accepts events and stops them only
/// after it has stopped feeding them. `dispatch` may be called from the
/// relay's worker thread and, transiently, from a producer thread taking the
/// synchronous fallback path; the owning sink set serializes those calls.
pub trait Sink: Send {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn dispatch(&mut self, event: &Event) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Flushes by default
    fn stop(&mut self) -> Result<()> {
        self.flush()
    }

    fn name(&self) -> &str;
}
