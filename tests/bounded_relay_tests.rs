//! Integration tests for the bounded relay
//!
//! These tests verify:
//! - FIFO delivery from a single producer
//! - Start validation and lifecycle transitions
//! - Backpressure on a full queue
//! - Synchronous fallback before start, after stop and while stopping
//! - Cancellable submits
//! - Sink failure isolation

use log_relay::prelude::*;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

/// Sink whose `dispatch` blocks until the gate is opened
struct GatedSink {
    gate: Arc<Gate>,
}

#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
    entered: AtomicUsize,
    delivered: Mutex<Vec<String>>,
}

impl Gate {
    fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }

    fn delivered(&self) -> Vec<String> {
        self.delivered.lock().clone()
    }
}

impl Sink for GatedSink {
    fn dispatch(&mut self, event: &Event) -> Result<()> {
        self.gate.entered.fetch_add(1, Ordering::SeqCst);
        let mut open = self.gate.open.lock();
        while !*open {
            self.gate.opened.wait(&mut open);
        }
        drop(open);
        self.gate.delivered.lock().push(event.render().into_owned());
        Ok(())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

struct FailingSink;

impl Sink for FailingSink {
    fn dispatch(&mut self, _event: &Event) -> Result<()> {
        Err(RelayError::sink("failing", "always fails"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

struct PanickingSink;

impl Sink for PanickingSink {
    fn dispatch(&mut self, _event: &Event) -> Result<()> {
        panic!("sink exploded");
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

fn event(message: impl Into<String>) -> Event {
    Event::new(LogLevel::Info, message)
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Capacity-1 relay whose worker is parked inside the gated sink with
/// `first` and whose queue holds `second`
fn saturated_relay() -> (Arc<BoundedRelay>, Arc<Gate>) {
    let gate = Arc::new(Gate::default());
    let relay = Arc::new(
        BoundedRelay::builder()
            .capacity(1)
            .sink(GatedSink {
                gate: Arc::clone(&gate),
            })
            .build(),
    );
    relay.start().expect("Failed to start relay");

    relay.submit(event("first")).unwrap();
    assert!(wait_until(|| gate.entered.load(Ordering::SeqCst) == 1));
    relay.submit(event("second")).unwrap();
    assert_eq!(relay.queue_len(), 1);

    (relay, gate)
}

#[test]
fn test_single_producer_fifo() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    let relay = BoundedRelay::builder().capacity(64).sink(sink).build();
    relay.start().unwrap();

    for i in 0..1000u32 {
        relay
            .submit(Event::new(LogLevel::Debug, "event {}").with_args([i]))
            .unwrap();
    }

    assert!(handle.wait_for(1000, WAIT));
    relay.stop().unwrap();

    let expected: Vec<String> = (0..1000).map(|i| format!("event {}", i)).collect();
    assert_eq!(handle.messages(), expected);
    assert_eq!(relay.metrics().enqueued(), 1000);
    assert_eq!(relay.metrics().dispatched(), 1000);
    assert_eq!(relay.metrics().sync_fallbacks(), 0);
}

#[test]
fn test_start_without_sinks_fails() {
    let relay = BoundedRelay::with_capacity(16);
    let err = relay.start().unwrap_err();

    assert!(matches!(err, RelayError::InvalidConfiguration { .. }));
    assert_eq!(relay.state(), RelayState::Created);
    assert!(!relay.is_worker_alive());
}

#[test]
fn test_start_with_zero_capacity_fails() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    let relay = BoundedRelay::builder().capacity(0).sink(sink).build();

    assert!(matches!(
        relay.start(),
        Err(RelayError::InvalidConfiguration { .. })
    ));
    assert_eq!(relay.state(), RelayState::Created);
    assert!(!handle.is_started());
}

#[test]
fn test_lifecycle_transitions() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    let relay = BoundedRelay::builder()
        .worker_name("lifecycle-relay")
        .sink(sink)
        .build();

    assert!(matches!(relay.stop(), Err(RelayError::InvalidState { .. })));

    relay.start().unwrap();
    relay.start().unwrap();
    assert_eq!(relay.state(), RelayState::Started);
    assert!(relay.is_worker_alive());
    assert!(handle.is_started());

    relay.stop().unwrap();
    assert_eq!(relay.state(), RelayState::Stopped);
    assert!(!relay.is_worker_alive());
    assert!(handle.is_stopped());

    assert!(matches!(relay.start(), Err(RelayError::InvalidState { .. })));
    assert!(matches!(relay.stop(), Err(RelayError::InvalidState { .. })));
}

#[test]
fn test_worker_thread_is_named() {
    struct ThreadNameSink(Arc<Mutex<Option<String>>>);

    impl Sink for ThreadNameSink {
        fn dispatch(&mut self, _event: &Event) -> Result<()> {
            *self.0.lock() = thread::current().name().map(str::to_string);
            Ok(())
        }

        fn name(&self) -> &str {
            "thread-name"
        }
    }

    let seen = Arc::new(Mutex::new(None));
    let relay = BoundedRelay::builder()
        .worker_name("named-relay")
        .sink(ThreadNameSink(Arc::clone(&seen)))
        .build();
    relay.start().unwrap();
    relay.submit(event("which thread")).unwrap();

    assert!(wait_until(|| seen.lock().is_some()));
    relay.stop().unwrap();
    assert_eq!(seen.lock().as_deref(), Some("named-relay"));
}

#[test]
fn test_submit_before_start_is_synchronous() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    let relay = BoundedRelay::builder().sink(sink).build();

    relay.submit(event("early")).unwrap();

    assert_eq!(handle.messages(), vec!["early"]);
    assert_eq!(relay.metrics().sync_fallbacks(), 1);
    assert_eq!(relay.metrics().enqueued(), 0);
}

#[test]
fn test_submit_after_stop_is_synchronous() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    let relay = BoundedRelay::builder().sink(sink).build();
    relay.start().unwrap();
    relay.stop().unwrap();

    relay.submit(event("late")).unwrap();

    assert_eq!(handle.messages(), vec!["late"]);
    assert_eq!(relay.metrics().sync_fallbacks(), 1);
}

#[test]
fn test_full_queue_blocks_producer() {
    let (relay, gate) = saturated_relay();
    let done = Arc::new(AtomicBool::new(false));

    let producer = {
        let relay = Arc::clone(&relay);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            relay.submit(event("third")).unwrap();
            done.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!done.load(Ordering::SeqCst), "producer should wait for room");

    gate.open();
    producer.join().unwrap();
    assert!(wait_until(|| gate.delivered().len() == 3));
    relay.stop().unwrap();

    assert_eq!(gate.delivered(), vec!["first", "second", "third"]);
    assert!(relay.metrics().blocked_submits() >= 1);
    assert_eq!(relay.metrics().sync_fallbacks(), 0);
}

#[test]
fn test_stop_releases_blocked_producer_into_fallback() {
    let (relay, gate) = saturated_relay();

    let producer = {
        let relay = Arc::clone(&relay);
        thread::spawn(move || relay.submit(event("third")))
    };
    assert!(wait_until(|| relay.metrics().blocked_submits() == 1));

    let stopper = {
        let relay = Arc::clone(&relay);
        thread::spawn(move || relay.stop())
    };

    // The woken producer records its fallback before waiting for the sinks.
    assert!(wait_until(|| relay.metrics().sync_fallbacks() == 1));
    gate.open();

    assert!(producer.join().unwrap().is_ok());
    assert!(stopper.join().unwrap().is_ok());

    let delivered = gate.delivered();
    assert_eq!(delivered[0], "first");
    assert_eq!(delivered.iter().filter(|m| *m == "third").count(), 1);
    assert!(!delivered.contains(&"second".to_string()));
    assert_eq!(relay.state(), RelayState::Stopped);
}

#[test]
fn test_cancelled_submit_loses_event() {
    let (relay, gate) = saturated_relay();
    let token = CancellationToken::new();

    let producer = {
        let relay = Arc::clone(&relay);
        let token = token.clone();
        thread::spawn(move || relay.submit_cancellable(event("third"), &token))
    };
    assert!(wait_until(|| relay.metrics().blocked_submits() == 1));

    assert!(token.cancel());
    let result = producer.join().unwrap();
    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(relay.metrics().lost_on_cancel(), 1);

    gate.open();
    assert!(wait_until(|| gate.delivered().len() == 2));
    relay.stop().unwrap();

    assert_eq!(gate.delivered(), vec!["first", "second"]);
}

#[test]
fn test_already_cancelled_token_refuses_submit() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    let relay = BoundedRelay::builder().capacity(4).sink(sink).build();
    relay.start().unwrap();

    let token = CancellationToken::new();
    token.cancel();

    let result = relay.submit_cancellable(event("never queued"), &token);
    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(relay.metrics().lost_on_cancel(), 1);
    relay.stop().unwrap();

    assert!(handle.is_empty());
}

#[test]
fn test_fast_stop_delivers_a_prefix() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    let relay = BoundedRelay::builder().capacity(10_000).sink(sink).build();
    relay.start().unwrap();

    for i in 0..5000u32 {
        relay.submit(event(format!("e{}", i))).unwrap();
    }
    relay.stop().unwrap();

    let messages = handle.messages();
    assert!(messages.len() <= 5000);
    for (i, message) in messages.iter().enumerate() {
        assert_eq!(message, &format!("e{}", i));
    }
    assert!(handle.is_stopped());
    assert_eq!(relay.queue_len(), 0);
}

#[test]
fn test_failing_sink_does_not_stop_delivery() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    let relay = BoundedRelay::builder()
        .sink(FailingSink)
        .sink(PanickingSink)
        .sink(sink)
        .build();
    relay.start().unwrap();

    for i in 0..10u32 {
        relay.submit(event(format!("m{}", i))).unwrap();
    }

    assert!(handle.wait_for(10, WAIT));
    assert!(relay.is_worker_alive());
    assert!(wait_until(|| relay.metrics().dispatch_failures() == 10));
    relay.stop().unwrap();
    assert_eq!(relay.metrics().dispatched(), 0);
}

#[test]
fn test_attach_after_start_starts_sink() {
    let first = MemorySink::named("first");
    let relay = BoundedRelay::builder().sink(first).build();
    relay.start().unwrap();

    let late = MemorySink::named("late");
    let late_handle = late.handle();
    let id = relay.attach_sink(Box::new(late)).unwrap();
    assert!(late_handle.is_started());
    assert_eq!(relay.sink_count(), 2);

    relay.submit(event("after attach")).unwrap();
    assert!(late_handle.wait_for(1, WAIT));

    assert!(relay.detach_sink(id).is_some());
    assert_eq!(relay.sink_count(), 1);
    relay.stop().unwrap();
    assert!(!late_handle.is_stopped());
}

#[test]
fn test_diagnostic_context_is_captured_on_submit() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    let relay = BoundedRelay::builder().sink(sink).build();
    relay.start().unwrap();

    {
        let _guard = DiagnosticContext::scoped("request_id", "req-42");
        relay.submit(event("with context")).unwrap();
    }
    relay.submit(event("without context")).unwrap();

    assert!(handle.wait_for(2, WAIT));
    relay.stop().unwrap();

    let events = handle.events();
    let context = events[0].context().expect("context captured");
    assert_eq!(context.get("request_id"), Some(&FieldValue::from("req-42")));
    assert!(events[1].context().map_or(true, |c| c.get("request_id").is_none()));
}

#[test]
fn test_context_capture_can_be_disabled() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    let relay = BoundedRelay::builder()
        .capture_context(false)
        .sink(sink)
        .build();
    relay.start().unwrap();

    let _guard = DiagnosticContext::scoped("request_id", "req-7");
    relay.submit(event("bare")).unwrap();
    assert!(handle.wait_for(1, WAIT));
    relay.stop().unwrap();

    assert!(handle.events()[0].context().is_none());
}

#[test]
fn test_file_sink_through_relay() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("relay.log");

    let relay = BoundedRelay::builder()
        .sink(FileSink::new(&log_file))
        .build();
    relay.start().unwrap();
    relay
        .submit(Event::new(LogLevel::Warn, "disk at {}%").with_args([91u32]))
        .unwrap();
    relay
        .submit(Event::new(LogLevel::Info, "forged\nERROR line"))
        .unwrap();

    assert!(wait_until(|| relay.metrics().dispatched() == 2));
    relay.stop().unwrap();

    let content = std::fs::read_to_string(&log_file).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("[WARN ]"));
    assert!(lines[0].ends_with("disk at 91%"));
    assert!(lines[1].contains("forged\\nERROR line"));
}

#[test]
fn test_relay_from_json_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("relay.json");
    std::fs::write(
        &path,
        r#"{ "capacity": 8, "worker_name": "json-relay", "capture_context": false }"#,
    )
    .unwrap();

    let config = RelayConfig::from_json_file(&path).unwrap();
    let relay = BoundedRelay::builder()
        .config(config)
        .sink(MemorySink::new())
        .build();

    assert_eq!(relay.config().capacity, 8);
    assert_eq!(relay.config().worker_name, "json-relay");
    assert!(!relay.config().capture_context);
    relay.start().unwrap();
    relay.stop().unwrap();
}

#[test]
fn test_drop_stops_started_relay() {
    let sink = MemorySink::new();
    let handle = sink.handle();
    {
        let relay = BoundedRelay::builder().sink(sink).build();
        relay.start().unwrap();
    }
    assert!(handle.is_stopped());
}
