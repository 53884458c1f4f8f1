//! Integration tests for the global relay
//!
//! These tests verify:
//! - Producers never block, even while the backend is stuck
//! - Shutdown drains every accepted event, from any number of threads
//! - Disabled levels are filtered on the caller's thread
//! - Logger memoization across threads
//! - Backend failures do not stop the worker
//! - The process-wide install path

use log_relay::prelude::*;
use log_relay::relay_info;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Backend recording rendered messages, optionally held shut by a gate
struct RecordingBackend {
    threshold: LogLevel,
    enabled_checks: AtomicUsize,
    gate_open: Mutex<bool>,
    gate: Condvar,
    emitted: Mutex<Vec<Event>>,
    stopped: AtomicUsize,
}

impl RecordingBackend {
    fn new(threshold: LogLevel) -> Arc<Self> {
        Arc::new(Self {
            threshold,
            enabled_checks: AtomicUsize::new(0),
            gate_open: Mutex::new(true),
            gate: Condvar::new(),
            emitted: Mutex::new(Vec::new()),
            stopped: AtomicUsize::new(0),
        })
    }

    fn closed(threshold: LogLevel) -> Arc<Self> {
        let backend = Self::new(threshold);
        *backend.gate_open.lock() = false;
        backend
    }

    fn open(&self) {
        *self.gate_open.lock() = true;
        self.gate.notify_all();
    }

    fn messages(&self) -> Vec<String> {
        self.emitted
            .lock()
            .iter()
            .map(|e| e.render().into_owned())
            .collect()
    }
}

impl Backend for RecordingBackend {
    fn is_enabled(&self, _target: &str, level: LogLevel, _marker: Option<&Marker>) -> bool {
        self.enabled_checks.fetch_add(1, Ordering::Relaxed);
        level >= self.threshold
    }

    fn emit(&self, event: &Event) -> Result<()> {
        let mut open = self.gate_open.lock();
        while !*open {
            self.gate.wait(&mut open);
        }
        drop(open);

        if event.template() == "panic" {
            panic!("backend cannot handle this event");
        }
        if event.template() == "fail" {
            return Err(RelayError::other("refused"));
        }
        self.emitted.lock().push(event.clone());
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_producers_never_block() {
    const THREADS: usize = 4;
    const PER_THREAD: u32 = 5_000;

    let backend = RecordingBackend::closed(LogLevel::Trace);
    let relay = Arc::new(GlobalRelay::new(backend.clone()).unwrap());

    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let relay = Arc::clone(&relay);
            thread::spawn(move || {
                let logger = relay.get_logger(&format!("hot.path{}", t));
                let started = Instant::now();
                for i in 0..PER_THREAD {
                    logger.info_args("event {}", &[i.into()]);
                }
                started.elapsed()
            })
        })
        .collect();

    for producer in producers {
        let elapsed = producer.join().unwrap();
        assert!(
            elapsed < Duration::from_secs(5),
            "producer stalled for {:?} behind a stuck backend",
            elapsed
        );
    }
    assert!(backend.emitted.lock().is_empty());

    let total = THREADS * PER_THREAD as usize;
    backend.open();
    assert!(relay.shutdown());
    assert_eq!(backend.emitted.lock().len(), total);
    assert_eq!(relay.metrics().enqueued(), total as u64);
}

/// Backend whose housekeeping calls always panic
struct PanickyFlushBackend {
    emitted: Mutex<Vec<String>>,
    flushes: AtomicUsize,
}

impl Backend for PanickyFlushBackend {
    fn is_enabled(&self, _target: &str, _level: LogLevel, _marker: Option<&Marker>) -> bool {
        true
    }

    fn emit(&self, event: &Event) -> Result<()> {
        self.emitted.lock().push(event.render().into_owned());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        panic!("flush exploded");
    }

    fn shutdown(&self) -> Result<()> {
        panic!("shutdown exploded");
    }
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[test]
fn test_panicking_flush_keeps_worker_draining() {
    let backend = Arc::new(PanickyFlushBackend {
        emitted: Mutex::new(Vec::new()),
        flushes: AtomicUsize::new(0),
    });
    let relay = GlobalRelay::new(backend.clone()).unwrap();
    let logger = relay.get_logger("flaky.flush");

    logger.info("first");
    assert!(wait_until(|| backend.flushes.load(Ordering::SeqCst) >= 1));
    assert!(relay.is_worker_alive());

    for i in 0..10u32 {
        logger.info_args("after {}", &[i.into()]);
    }
    assert!(relay.shutdown());
    assert!(!relay.is_worker_alive());

    let emitted = backend.emitted.lock().clone();
    assert_eq!(emitted.len(), 11);
    assert_eq!(emitted[0], "first");
    assert_eq!(emitted[10], "after 9");

    let metrics = relay.metrics();
    assert_eq!(metrics.dispatched(), 11);
    assert_eq!(metrics.dropped_after_shutdown(), 0);
    // Every panicking flush and the panicking shutdown are counted.
    assert_eq!(
        metrics.dispatch_failures(),
        backend.flushes.load(Ordering::SeqCst) as u64 + 1
    );
}

#[test]
fn test_metrics_add_up_when_producers_race_shutdown() {
    const THREADS: usize = 4;
    const PER_THREAD: u32 = 2_000;

    let backend = RecordingBackend::new(LogLevel::Trace);
    let relay = Arc::new(GlobalRelay::new(backend.clone()).unwrap());

    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let relay = Arc::clone(&relay);
            thread::spawn(move || {
                let logger = relay.get_logger(&format!("racer{}", t));
                for i in 0..PER_THREAD {
                    logger.info_args("{}", &[i.into()]);
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(2));
    assert!(relay.shutdown());
    for producer in producers {
        producer.join().unwrap();
    }

    let metrics = relay.metrics();
    let emitted = backend.emitted.lock().len() as u64;
    assert_eq!(metrics.enqueued(), emitted);
    assert_eq!(metrics.dispatched(), emitted);
    assert_eq!(
        metrics.enqueued() + metrics.dropped_after_shutdown(),
        (THREADS * PER_THREAD as usize) as u64
    );
    assert_eq!(relay.queue_len(), 0);
}

#[test]
fn test_shutdown_drains_concurrent_producers() {
    const THREADS: usize = 4;
    const PER_THREAD: u32 = 250;

    let backend = RecordingBackend::new(LogLevel::Trace);
    let relay = Arc::new(GlobalRelay::new(backend.clone()).unwrap());

    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let relay = Arc::clone(&relay);
            thread::spawn(move || {
                let logger = relay.get_logger(&format!("producer{}", t));
                for i in 0..PER_THREAD {
                    logger.debug_args("{}", &[i.into()]);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(relay.shutdown());
    assert!(!relay.shutdown());
    assert_eq!(backend.stopped.load(Ordering::SeqCst), 1);

    let emitted = backend.emitted.lock().clone();
    assert_eq!(emitted.len(), THREADS * PER_THREAD as usize);

    // Each producer's own events keep their submission order.
    let mut per_target: HashMap<String, Vec<String>> = HashMap::new();
    for event in &emitted {
        per_target
            .entry(event.target().unwrap_or_default().to_string())
            .or_default()
            .push(event.render().into_owned());
    }
    let expected: Vec<String> = (0..PER_THREAD).map(|i| i.to_string()).collect();
    for messages in per_target.values() {
        assert_eq!(messages, &expected);
    }
}

#[test]
fn test_shutdown_with_empty_queue() {
    let backend = RecordingBackend::new(LogLevel::Trace);
    let relay = GlobalRelay::new(backend.clone()).unwrap();

    assert!(relay.shutdown());
    assert!(backend.emitted.lock().is_empty());
    assert_eq!(backend.stopped.load(Ordering::SeqCst), 1);
    assert!(relay.is_shut_down());
}

#[test]
fn test_disabled_levels_are_not_enqueued() {
    let backend = RecordingBackend::new(LogLevel::Warn);
    let relay = GlobalRelay::new(backend.clone()).unwrap();
    let logger = relay.get_logger("filtered");

    logger.trace("t");
    logger.debug("d");
    logger.info("i");
    assert!(!logger.is_info_enabled());
    assert!(logger.is_error_enabled());
    assert_eq!(relay.metrics().enqueued(), 0);

    logger.warn("w");
    logger.error("e");
    assert!(relay.shutdown());

    assert_eq!(backend.messages(), vec!["w", "e"]);
    assert!(backend.enabled_checks.load(Ordering::Relaxed) >= 5);
}

#[test]
fn test_loggers_are_memoized_across_threads() {
    let relay = Arc::new(GlobalRelay::new(RecordingBackend::new(LogLevel::Info)).unwrap());

    let loggers: Vec<Arc<RelayLogger>> = (0..8)
        .map(|_| {
            let relay = Arc::clone(&relay);
            thread::spawn(move || relay.get_logger("shared"))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    for logger in &loggers[1..] {
        assert!(Arc::ptr_eq(&loggers[0], logger));
    }
    assert_eq!(relay.registry().len(), 1);
    assert_eq!(relay.registry().names(), vec!["shared"]);
}

#[test]
fn test_events_after_shutdown_are_dropped() {
    let backend = RecordingBackend::new(LogLevel::Trace);
    let relay = GlobalRelay::new(backend.clone()).unwrap();
    let logger = relay.get_logger("late");

    logger.info("before");
    assert!(relay.shutdown());
    logger.info("after");
    relay.submit(Event::new(LogLevel::Error, "after, prebuilt"));

    assert_eq!(backend.messages(), vec!["before"]);
    assert_eq!(relay.metrics().dropped_after_shutdown(), 2);
}

#[test]
fn test_backend_failures_do_not_stop_worker() {
    let backend = RecordingBackend::new(LogLevel::Trace);
    let relay = GlobalRelay::new(backend.clone()).unwrap();
    let logger = relay.get_logger("fragile");

    logger.info("one");
    logger.info("panic");
    logger.info("fail");
    logger.info("two");
    assert!(relay.shutdown());

    assert_eq!(backend.messages(), vec!["one", "two"]);
    assert_eq!(relay.metrics().dispatch_failures(), 2);
    assert_eq!(relay.metrics().dispatched(), 2);
}

#[test]
fn test_events_keep_caller_thread_details() {
    let backend = RecordingBackend::new(LogLevel::Trace);
    let relay = Arc::new(GlobalRelay::new(backend.clone()).unwrap());

    let relay_for_thread = Arc::clone(&relay);
    thread::Builder::new()
        .name("request-handler".to_string())
        .spawn(move || {
            let _guard = DiagnosticContext::scoped("user", "alice");
            relay_for_thread.get_logger("web").info("handled");
        })
        .unwrap()
        .join()
        .unwrap();
    assert!(relay.shutdown());

    let emitted = backend.emitted.lock();
    let event = &emitted[0];
    assert_eq!(event.thread_name(), Some("request-handler"));
    assert_eq!(event.context().and_then(|c| c.get("user")), Some(&FieldValue::from("alice")));
    assert!(event.location().unwrap().file.ends_with("global_relay_tests.rs"));
}

#[test]
fn test_sink_backend_end_to_end() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    let backend = SinkBackend::new(
        LevelFilter::new(LogLevel::Warn).with_target("app::db", LogLevel::Debug),
    )
    .with_sink(sink)
    .unwrap();
    let relay = GlobalRelay::new(Arc::new(backend)).unwrap();

    let db = relay.get_logger("app::db::pool");
    let http = relay.get_logger("app::http");
    relay_info!(db, "pool size {}", 16);
    relay_info!(http, "request served");
    relay_info!(http, "ignored too");
    http.error("upstream down");

    assert!(relay.shutdown());
    assert_eq!(handle.messages(), vec!["pool size 16", "upstream down"]);
    assert!(handle.is_stopped());
}

/// The only test in this binary that touches the process-wide relay.
#[test]
fn test_process_wide_relay() {
    let backend = RecordingBackend::new(LogLevel::Info);
    let guard = log_relay::init(backend.clone()).expect("first install succeeds");

    assert!(matches!(
        log_relay::init(RecordingBackend::new(LogLevel::Info)),
        Err(RelayError::AlreadyInitialized)
    ));

    let logger = log_relay::get_logger("process").unwrap();
    assert!(Arc::ptr_eq(&logger, &log_relay::get_logger("process").unwrap()));
    logger.info("from the global relay");
    logger.debug("below threshold");

    drop(guard);
    assert!(!log_relay::shutdown());
    assert_eq!(backend.messages(), vec!["from the global relay"]);
    assert_eq!(backend.stopped.load(Ordering::SeqCst), 1);

    logger.warn("after shutdown");
    assert_eq!(backend.messages().len(), 1);
}
