//! Ordered set of sinks owned by a relay

use super::{error::Result, event::Event, sink::Sink};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by [`SinkSet::attach`], used to detach that sink later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(u64);

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink#{}", self.0)
    }
}

struct SinkSlot {
    id: SinkId,
    sink: Box<dyn Sink>,
}

/// Result of dispatching one event to every sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Extract a readable message from a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Ordered collection of attached sinks
///
/// Cloning yields another handle to the same set. All access is serialized by
/// one lock, so the worker's dispatch and a producer's fallback dispatch never
/// run inside the same sink at once. Each sink call is isolated: an error or a
/// panic in one sink is reported on stderr and the remaining sinks still
/// receive the event. Nothing is retried.
#[derive(Clone, Default)]
pub struct SinkSet {
    slots: Arc<Mutex<Vec<SinkSlot>>>,
    next_id: Arc<AtomicU64>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sink; it will receive events after all previously attached ones
    pub fn attach(&self, sink: Box<dyn Sink>) -> SinkId {
        let id = SinkId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.slots.lock().push(SinkSlot { id, sink });
        id
    }

    /// Remove a sink by id, handing it back without stopping it
    pub fn detach(&self, id: SinkId) -> Option<Box<dyn Sink>> {
        let mut slots = self.slots.lock();
        let index = slots.iter().position(|slot| slot.id == id)?;
        Some(slots.remove(index).sink)
    }

    /// Remove every sink, in attachment order
    pub fn detach_all(&self) -> Vec<Box<dyn Sink>> {
        self.slots.lock().drain(..).map(|slot| slot.sink).collect()
    }

    pub fn contains(&self, id: SinkId) -> bool {
        self.slots.lock().iter().any(|slot| slot.id == id)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Sink names in attachment order
    pub fn names(&self) -> Vec<String> {
        self.slots
            .lock()
            .iter()
            .map(|slot| slot.sink.name().to_string())
            .collect()
    }

    /// Start every sink in attachment order
    ///
    /// If one fails, the sinks started before it are stopped again and the
    /// error is returned.
    pub fn start_all(&self) -> Result<()> {
        let mut slots = self.slots.lock();
        for index in 0..slots.len() {
            if let Err(e) = slots[index].sink.start() {
                for slot in slots[..index].iter_mut().rev() {
                    if let Err(stop_err) = slot.sink.stop() {
                        eprintln!(
                            "[RELAY ERROR] Sink '{}' failed to stop during rollback: {}",
                            slot.sink.name(),
                            stop_err
                        );
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop every sink in attachment order
    ///
    /// All sinks are stopped even if some fail; the first failure is returned.
    pub fn stop_all(&self) -> Result<()> {
        let mut first_error = None;
        for slot in self.slots.lock().iter_mut() {
            if let Err(e) = slot.sink.stop() {
                eprintln!("[RELAY ERROR] Sink '{}' failed to stop: {}", slot.sink.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Dispatch one event to every sink in attachment order
    pub fn dispatch(&self, event: &Event) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut slots = self.slots.lock();

        for slot in slots.iter_mut() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                slot.sink.dispatch(event)
            }));

            match result {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    eprintln!("[RELAY ERROR] Sink '{}' failed: {}", slot.sink.name(), e);
                    report.failed += 1;
                }
                Err(panic_info) => {
                    eprintln!(
                        "[RELAY CRITICAL] Sink '{}' panicked: {}. \
                         Other sinks continue to function.",
                        slot.sink.name(),
                        panic_message(panic_info.as_ref())
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Flush every sink, reporting failures on stderr
    pub fn flush_all(&self) {
        for slot in self.slots.lock().iter_mut() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                slot.sink.flush()
            }));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!("[RELAY ERROR] Sink '{}' flush failed: {}", slot.sink.name(), e);
                }
                Err(panic_info) => {
                    eprintln!(
                        "[RELAY CRITICAL] Sink '{}' panicked during flush: {}",
                        slot.sink.name(),
                        panic_message(panic_info.as_ref())
                    );
                }
            }
        }
    }
}

impl fmt::Debug for SinkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkSet")
            .field("sinks", &self.names())
            .finish()
    }
}
