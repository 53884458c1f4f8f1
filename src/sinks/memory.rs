//! In-memory sink that keeps every dispatched event

use crate::core::{Event, Result, Sink};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct MemoryState {
    events: Vec<Event>,
    started: bool,
    stopped: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<MemoryState>,
    changed: Condvar,
}

/// Sink that stores events in memory
///
/// The sink itself moves into a relay; keep a [`MemoryHandle`] (from
/// [`MemorySink::handle`]) to inspect what it received.
pub struct MemorySink {
    name: String,
    shared: Arc<Shared>,
}

/// Read side of a [`MemorySink`]
#[derive(Clone)]
pub struct MemoryHandle {
    shared: Arc<Shared>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn start(&mut self) -> Result<()> {
        self.shared.state.lock().started = true;
        Ok(())
    }

    fn dispatch(&mut self, event: &Event) -> Result<()> {
        self.shared.state.lock().events.push(event.clone());
        self.shared.changed.notify_all();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.shared.state.lock().stopped = true;
        self.shared.changed.notify_all();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl MemoryHandle {
    pub fn events(&self) -> Vec<Event> {
        self.shared.state.lock().events.clone()
    }

    /// Rendered messages in arrival order
    pub fn messages(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .events
            .iter()
            .map(|event| event.render().into_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_started(&self) -> bool {
        self.shared.state.lock().started
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().stopped
    }

    pub fn clear(&self) {
        self.shared.state.lock().events.clear();
    }

    /// Wait until at least `count` events arrived or `timeout` elapsed
    ///
    /// Returns whether the count was reached.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.events.len() < count {
            if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                return state.events.len() >= count;
            }
        }
        true
    }
}
