//! Process-wide unbounded relay shared by every named logger
//!
//! One unbounded queue and one worker thread serve all loggers handed out by
//! the relay's registry. Producers never block. Shutdown is by sentinel: a
//! single reserved message is queued behind everything already accepted, and
//! the worker drains up to it before exiting, so nothing accepted before
//! shutdown is lost.
//!
//! The process-wide instance is installed with [`init`] (or lazily by
//! [`get_logger`] with a console backend). Rust runs no hooks at process
//! exit, so the drain is triggered by dropping the [`ShutdownGuard`] returned
//! from [`init`], or by calling [`shutdown`] explicitly.

use super::facade::RelayLogger;
use super::registry::Registry;
use crate::backend::{Backend, LevelFilter, SinkBackend};
use crate::core::sink_set::panic_message;
use crate::core::{Event, EventQueue, QueuePolicy, RelayError, RelayMetrics, Result};
use crate::sinks::ConsoleSink;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Name of the global relay's worker thread
pub const GLOBAL_WORKER_NAME: &str = "log-relay-global";

/// What travels through the global queue
enum Envelope {
    Event(Event),
    /// Reserved stop marker; never built from a log call.
    Shutdown,
}

/// State shared between the relay, its loggers and its worker
pub(crate) struct RelayCore {
    queue: EventQueue<Envelope>,
    backend: Arc<dyn Backend>,
    metrics: RelayMetrics,
    shutting_down: AtomicBool,
    /// Set once `shutdown` has joined the worker and drained what was left
    drained: AtomicBool,
    worker_alive: AtomicBool,
}

impl RelayCore {
    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Queue an event for the worker; never blocks
    pub(crate) fn enqueue(&self, event: Event) {
        if self.shutting_down.load(Ordering::SeqCst) {
            self.metrics.record_dropped_after_shutdown();
            return;
        }

        // Must be counted before the push; reclaim subtracts from `enqueued`.
        self.metrics.record_enqueued();
        if self.queue.try_push(Envelope::Event(event)).is_err() {
            // An unbounded queue owning its receiver cannot refuse.
            self.metrics.record_reclaimed_after_shutdown(1);
            return;
        }

        // Raced past the shutdown check and landed after the final drain.
        if self.drained.load(Ordering::SeqCst) {
            self.reclaim_stragglers();
        }
    }

    /// Discard events nobody will emit, moving them to `dropped_after_shutdown`
    fn reclaim_stragglers(&self) {
        let stragglers = self
            .queue
            .drain()
            .into_iter()
            .filter(|envelope| matches!(envelope, Envelope::Event(_)))
            .count();
        self.metrics
            .record_reclaimed_after_shutdown(stragglers as u64);
    }
}

/// Unbounded relay with a memoizing logger registry
///
/// # Example
///
/// ```
/// use log_relay::prelude::*;
/// use std::sync::Arc;
///
/// let sink = MemorySink::new();
/// let handle = sink.handle();
/// let backend = SinkBackend::new(LevelFilter::new(LogLevel::Info)).with_sink(sink).unwrap();
///
/// let relay = GlobalRelay::new(Arc::new(backend)).unwrap();
/// let logger = relay.get_logger("app::startup");
/// logger.info_args("listening on port {}", &[8080u32.into()]);
/// logger.debug("filtered out");
///
/// relay.shutdown();
/// assert_eq!(handle.messages(), vec!["listening on port 8080"]);
/// ```
pub struct GlobalRelay {
    core: Arc<RelayCore>,
    registry: Registry,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl GlobalRelay {
    /// Create a relay and start its worker thread
    pub fn new(backend: Arc<dyn Backend>) -> Result<Self> {
        Self::with_worker_name(backend, GLOBAL_WORKER_NAME)
    }

    pub fn with_worker_name(backend: Arc<dyn Backend>, worker_name: &str) -> Result<Self> {
        let core = Arc::new(RelayCore {
            queue: EventQueue::new(QueuePolicy::Unbounded)?,
            backend,
            metrics: RelayMetrics::new(),
            shutting_down: AtomicBool::new(false),
            drained: AtomicBool::new(false),
            worker_alive: AtomicBool::new(true),
        });

        let worker = {
            let core = Arc::clone(&core);
            thread::Builder::new()
                .name(worker_name.to_string())
                .spawn(move || run_worker(&core))
                .map_err(|source| RelayError::WorkerSpawn {
                    name: worker_name.to_string(),
                    source,
                })?
        };

        Ok(Self {
            core,
            registry: Registry::new(),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Return the logger for `name`, creating it on first request
    ///
    /// Every call with the same name returns the same instance.
    pub fn get_logger(&self, name: &str) -> Arc<RelayLogger> {
        self.registry
            .get_or_create(name, |name| RelayLogger::new(name, Arc::clone(&self.core)))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Queue a prebuilt event, skipping the enablement check
    ///
    /// Never blocks. After shutdown the event is counted and discarded.
    pub fn submit(&self, event: Event) {
        self.core.enqueue(event.freeze());
    }

    pub fn metrics(&self) -> &RelayMetrics {
        &self.core.metrics
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.core.backend
    }

    pub fn queue_len(&self) -> usize {
        self.core.queue.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.core.shutting_down.load(Ordering::SeqCst)
    }

    /// Whether the worker thread is still running
    ///
    /// `false` after `shutdown`, or if the worker exited abnormally.
    pub fn is_worker_alive(&self) -> bool {
        self.core.worker_alive.load(Ordering::Acquire)
    }

    /// Queue the shutdown sentinel and wait for the worker to drain up to it
    ///
    /// Every event accepted before this call is emitted before it returns.
    /// Only the first call does anything; it returns `true`.
    pub fn shutdown(&self) -> bool {
        if self.core.shutting_down.swap(true, Ordering::SeqCst) {
            return false;
        }

        if self.core.queue.try_push(Envelope::Shutdown).is_err() {
            eprintln!("[RELAY CRITICAL] Could not queue shutdown sentinel for global relay");
            return true;
        }

        if let Some(handle) = self.worker.lock().take() {
            if let Err(panic_info) = handle.join() {
                eprintln!(
                    "[RELAY ERROR] Global relay worker panicked: {}",
                    panic_message(panic_info.as_ref())
                );
            }
        }

        // Producers that raced the sentinel landed behind it.
        self.core.drained.store(true, Ordering::SeqCst);
        self.core.reclaim_stragglers();
        true
    }
}

impl Drop for GlobalRelay {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for GlobalRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalRelay")
            .field("loggers", &self.registry.len())
            .field("queued", &self.queue_len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Emit one event on the backend, isolating failures
fn replay(core: &RelayCore, event: &Event) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        core.backend.emit(event)
    }));

    match result {
        Ok(Ok(())) => {
            core.metrics.record_dispatched();
        }
        Ok(Err(e)) => {
            eprintln!(
                "[RELAY ERROR] Backend failed for '{}': {}",
                event.target().unwrap_or_default(),
                e
            );
            core.metrics.record_dispatch_failure();
        }
        Err(panic_info) => {
            eprintln!(
                "[RELAY CRITICAL] Backend panicked for '{}': {}. Worker continues.",
                event.target().unwrap_or_default(),
                panic_message(panic_info.as_ref())
            );
            core.metrics.record_dispatch_failure();
        }
    }
}

/// Run a backend housekeeping call, isolating failures
fn call_backend(core: &RelayCore, operation: &str, call: impl FnOnce() -> Result<()>) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(call));

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("[RELAY ERROR] Backend {} failed: {}", operation, e);
            core.metrics.record_dispatch_failure();
        }
        Err(panic_info) => {
            eprintln!(
                "[RELAY CRITICAL] Backend panicked during {}: {}. Worker continues.",
                operation,
                panic_message(panic_info.as_ref())
            );
            core.metrics.record_dispatch_failure();
        }
    }
}

/// Clears the alive flag when the worker exits, reporting an abnormal exit
/// at once rather than when `shutdown` joins the thread.
struct WorkerExit<'a> {
    core: &'a RelayCore,
}

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        self.core.worker_alive.store(false, Ordering::Release);
        if thread::panicking() {
            eprintln!(
                "[RELAY CRITICAL] Global relay worker exited abnormally with {} events queued",
                self.core.queue.len()
            );
        }
    }
}

fn run_worker(core: &RelayCore) {
    let _exit = WorkerExit { core };

    while let Some(Envelope::Event(event)) = core.queue.pop_blocking() {
        replay(core, &event);
        if core.queue.is_empty() {
            call_backend(core, "flush", || core.backend.flush());
        }
    }

    call_backend(core, "shutdown", || core.backend.shutdown());
}

static GLOBAL: OnceCell<GlobalRelay> = OnceCell::new();

/// Drains the process-wide relay when dropped
///
/// Keep it alive for the lifetime of `main`.
#[must_use = "dropping the guard immediately shuts the global relay down"]
pub struct ShutdownGuard {
    _private: (),
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        shutdown();
    }
}

impl fmt::Debug for ShutdownGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShutdownGuard")
    }
}

/// Install the process-wide relay with `backend`
///
/// Fails with [`RelayError::AlreadyInitialized`] if a relay is already
/// installed, including one created lazily by [`get_logger`].
pub fn init(backend: Arc<dyn Backend>) -> Result<ShutdownGuard> {
    let mut installed = false;
    GLOBAL.get_or_try_init(|| {
        installed = true;
        GlobalRelay::new(backend)
    })?;

    if installed {
        Ok(ShutdownGuard { _private: () })
    } else {
        Err(RelayError::AlreadyInitialized)
    }
}

/// The process-wide relay, installing a console-backed one on first use
pub fn global() -> Result<&'static GlobalRelay> {
    GLOBAL.get_or_try_init(|| GlobalRelay::new(Arc::new(default_backend()?)))
}

/// Logger for `name` from the process-wide relay
pub fn get_logger(name: &str) -> Result<Arc<RelayLogger>> {
    Ok(global()?.get_logger(name))
}

/// Drain and stop the process-wide relay, if one is installed
///
/// Returns `true` if this call performed the shutdown.
pub fn shutdown() -> bool {
    GLOBAL.get().is_some_and(GlobalRelay::shutdown)
}

fn default_backend() -> Result<SinkBackend> {
    SinkBackend::new(LevelFilter::new(crate::core::LogLevel::Info)).with_sink(ConsoleSink::new())
}
