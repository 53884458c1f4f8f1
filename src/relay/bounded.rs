//! Bounded relay: one queue, one worker and one sink set per output channel

use crate::core::{
    CancellationToken, Event, EventQueue, QueuePolicy, RelayConfig, RelayError, RelayMetrics,
    Result, Sink, SinkId, SinkSet,
};
use crate::core::sink_set::{panic_message, DispatchReport};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Lifecycle state of a relay
///
/// `Created -> Started -> Stopped`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Created,
    Started,
    Stopped,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::Created => write!(f, "Created"),
            RelayState::Started => write!(f, "Started"),
            RelayState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Handles a producer needs to reach the worker
#[derive(Clone)]
struct Channel {
    queue: Arc<EventQueue<Event>>,
    cancel: CancellationToken,
    alive: Arc<AtomicBool>,
}

impl Channel {
    fn accepts(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.cancel.is_cancelled()
    }
}

enum Lifecycle {
    Created,
    Started(Channel),
    Stopped,
}

impl Lifecycle {
    fn state(&self) -> RelayState {
        match self {
            Lifecycle::Created => RelayState::Created,
            Lifecycle::Started(_) => RelayState::Started,
            Lifecycle::Stopped => RelayState::Stopped,
        }
    }
}

/// Clears the alive flag and cancels the channel when the worker exits,
/// however it exits, so blocked producers are never left waiting on it.
struct WorkerExit {
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Drop for WorkerExit {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        self.cancel.cancel();
    }
}

/// Asynchronous relay for one fixed set of sinks
///
/// Producers hand events to a bounded queue and a dedicated worker thread
/// delivers them to every attached sink in order. A full queue blocks the
/// producer (backpressure). Before `start()` and once stopping has begun,
/// events are delivered inline on the caller's thread instead.
///
/// `stop()` does not drain: events still queued when the worker sees the
/// stop signal are discarded. Callers that need full delivery must wait for
/// the queue to empty first.
///
/// # Example
///
/// ```
/// use log_relay::prelude::*;
///
/// let sink = MemorySink::new();
/// let handle = sink.handle();
///
/// let relay = BoundedRelay::builder()
///     .capacity(1024)
///     .sink(sink)
///     .build();
/// relay.start().unwrap();
///
/// relay.submit(Event::new(LogLevel::Info, "queued {}").with_args([1i64])).unwrap();
/// handle.wait_for(1, std::time::Duration::from_secs(5));
/// relay.stop().unwrap();
///
/// assert_eq!(handle.messages(), vec!["queued 1"]);
/// ```
pub struct BoundedRelay {
    config: RelayConfig,
    sinks: SinkSet,
    lifecycle: RwLock<Lifecycle>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    metrics: Arc<RelayMetrics>,
}

impl BoundedRelay {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            sinks: SinkSet::new(),
            lifecycle: RwLock::new(Lifecycle::Created),
            worker: Mutex::new(None),
            metrics: Arc::new(RelayMetrics::new()),
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(RelayConfig {
            capacity,
            ..RelayConfig::default()
        })
    }

    #[must_use]
    pub fn builder() -> BoundedRelayBuilder {
        BoundedRelayBuilder::new()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn state(&self) -> RelayState {
        self.lifecycle.read().state()
    }

    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Whether the worker thread is running and has not been told to stop
    pub fn is_worker_alive(&self) -> bool {
        match &*self.lifecycle.read() {
            Lifecycle::Started(channel) => channel.accepts(),
            _ => false,
        }
    }

    /// Events currently waiting in the queue
    pub fn queue_len(&self) -> usize {
        match &*self.lifecycle.read() {
            Lifecycle::Started(channel) => channel.queue.len(),
            _ => 0,
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Attach a sink after those already attached
    ///
    /// On a started relay the sink is started before it becomes visible to
    /// the worker; if that fails it is not attached.
    pub fn attach_sink(&self, mut sink: Box<dyn Sink>) -> Result<SinkId> {
        let lifecycle = self.lifecycle.read();
        if let Lifecycle::Started(_) = &*lifecycle {
            sink.start()?;
        }
        Ok(self.sinks.attach(sink))
    }

    /// Detach a sink, handing it back unstopped
    pub fn detach_sink(&self, id: SinkId) -> Option<Box<dyn Sink>> {
        self.sinks.detach(id)
    }

    pub fn detach_all_sinks(&self) -> Vec<Box<dyn Sink>> {
        self.sinks.detach_all()
    }

    /// Start the relay
    ///
    /// Fails with a configuration error, leaving the relay in `Created`, if
    /// no sink is attached or the capacity is zero. Starting a started relay
    /// is a no-op; a stopped relay cannot be restarted.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.write();
        match &*lifecycle {
            Lifecycle::Started(_) => return Ok(()),
            Lifecycle::Stopped => return Err(RelayError::invalid_state("start", RelayState::Stopped)),
            Lifecycle::Created => {}
        }

        if self.sinks.is_empty() {
            return Err(RelayError::config(
                "BoundedRelay",
                "at least one sink must be attached before start",
            ));
        }
        self.config.validate()?;

        let queue = Arc::new(EventQueue::new(QueuePolicy::Bounded(self.config.capacity))?);
        self.sinks.start_all()?;

        let channel = Channel {
            queue,
            cancel: CancellationToken::new(),
            alive: Arc::new(AtomicBool::new(true)),
        };

        let spawned = {
            let channel = channel.clone();
            let sinks = self.sinks.clone();
            let metrics = Arc::clone(&self.metrics);
            thread::Builder::new()
                .name(self.config.worker_name.clone())
                .spawn(move || run_worker(channel, sinks, metrics))
        };

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                *lifecycle = Lifecycle::Started(channel);
                Ok(())
            }
            Err(source) => {
                if let Err(e) = self.sinks.stop_all() {
                    eprintln!("[RELAY ERROR] Failed to stop sinks after spawn failure: {}", e);
                }
                Err(RelayError::WorkerSpawn {
                    name: self.config.worker_name.clone(),
                    source,
                })
            }
        }
    }

    /// Hand an event to the worker, blocking while the queue is full
    ///
    /// If the relay is not started, or its worker has stopped or been told to
    /// stop, the event is delivered inline on this thread instead. A producer
    /// parked on a full queue when `stop()` is called also falls back to
    /// inline delivery.
    pub fn submit(&self, event: Event) -> Result<()> {
        self.submit_inner(event, None)
    }

    /// Like [`submit`](Self::submit), but a blocked enqueue is abandoned
    /// when `token` is cancelled
    ///
    /// The abandoned event is lost and `Err(RelayError::Cancelled)` is
    /// returned; it is up to the caller whether to resubmit.
    pub fn submit_cancellable(&self, event: Event, token: &CancellationToken) -> Result<()> {
        self.submit_inner(event, Some(token))
    }

    fn submit_inner(&self, event: Event, caller: Option<&CancellationToken>) -> Result<()> {
        let event = if self.config.capture_context {
            event.freeze()
        } else {
            event
        };

        let channel = match &*self.lifecycle.read() {
            Lifecycle::Started(channel) if channel.accepts() => Some(channel.clone()),
            _ => None,
        };
        let Some(channel) = channel else {
            self.dispatch_inline(&event);
            return Ok(());
        };

        if channel.queue.is_full() {
            self.metrics.record_blocked_submit();
        }

        match channel.queue.push(event, &channel.cancel, caller) {
            Ok(()) => {
                self.metrics.record_enqueued();
                Ok(())
            }
            Err(abandoned) if caller.is_some_and(CancellationToken::is_cancelled) => {
                self.metrics.record_lost_on_cancel();
                Err(abandoned.into())
            }
            Err(abandoned) => {
                // The worker went away while we were waiting for room.
                self.dispatch_inline(&abandoned.into_inner());
                Ok(())
            }
        }
    }

    fn dispatch_inline(&self, event: &Event) {
        self.metrics.record_sync_fallback();
        record_report(&self.metrics, self.sinks.dispatch(event));
        self.sinks.flush_all();
    }

    /// Stop the worker, then stop every sink in attachment order
    ///
    /// Only valid on a started relay. Events still queued when the worker
    /// observes the signal are discarded.
    pub fn stop(&self) -> Result<()> {
        let channel = {
            let mut lifecycle = self.lifecycle.write();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Started(channel) => channel,
                other => {
                    let state = other.state();
                    *lifecycle = other;
                    return Err(RelayError::invalid_state("stop", state));
                }
            }
        };

        channel.cancel.cancel();

        if let Some(handle) = self.worker.lock().take() {
            if let Err(panic_info) = handle.join() {
                eprintln!(
                    "[RELAY ERROR] Worker '{}' panicked: {}",
                    self.config.worker_name,
                    panic_message(panic_info.as_ref())
                );
            }
        }

        let undelivered = channel.queue.drain().len();
        if undelivered > 0 {
            eprintln!(
                "[RELAY WARNING] Relay '{}' stopped with {} undelivered events",
                self.config.worker_name, undelivered
            );
        }

        self.sinks.stop_all()
    }
}

impl Drop for BoundedRelay {
    fn drop(&mut self) {
        if self.state() == RelayState::Started {
            if let Err(e) = self.stop() {
                eprintln!("[RELAY ERROR] Failed to stop relay during drop: {}", e);
            }
        }
    }
}

impl fmt::Debug for BoundedRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedRelay")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("sinks", &self.sinks)
            .finish()
    }
}

fn record_report(metrics: &RelayMetrics, report: DispatchReport) {
    if report.is_success() {
        metrics.record_dispatched();
    } else {
        metrics.record_dispatch_failure();
    }
}

fn run_worker(channel: Channel, sinks: SinkSet, metrics: Arc<RelayMetrics>) {
    let _exit = WorkerExit {
        alive: Arc::clone(&channel.alive),
        cancel: channel.cancel.clone(),
    };

    while !channel.cancel.is_cancelled() {
        let Ok(event) = channel.queue.pop(&channel.cancel) else {
            break;
        };
        record_report(&metrics, sinks.dispatch(&event));

        if channel.queue.is_empty() {
            sinks.flush_all();
        }
    }
}

/// Builder for constructing a [`BoundedRelay`] with a fluent API
///
/// # Example
/// ```
/// use log_relay::prelude::*;
///
/// let relay = BoundedRelay::builder()
///     .capacity(256)
///     .worker_name("audit-relay")
///     .sink(MemorySink::new())
///     .build();
///
/// assert_eq!(relay.state(), RelayState::Created);
/// assert_eq!(relay.sink_count(), 1);
/// ```
pub struct BoundedRelayBuilder {
    config: RelayConfig,
    sinks: Vec<Box<dyn Sink>>,
}

impl BoundedRelayBuilder {
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
            sinks: Vec::new(),
        }
    }

    /// Replace the whole configuration
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker_name = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn capture_context(mut self, capture: bool) -> Self {
        self.config.capture_context = capture;
        self
    }

    /// Attach a sink; sinks receive events in the order they were added
    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Build the relay in the `Created` state
    pub fn build(self) -> BoundedRelay {
        let relay = BoundedRelay::new(self.config);
        for sink in self.sinks {
            relay.sinks.attach(sink);
        }
        relay
    }
}

impl Default for BoundedRelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
