//! # Log Relay
//!
//! Asynchronous hand-off of log events from producer threads to output sinks.
//!
//! ## Features
//!
//! - **Bounded relay**: one queue, one worker and one sink set per channel, with
//!   blocking backpressure and synchronous fallback when the worker is absent
//! - **Global relay**: a process-wide unbounded relay behind named loggers that
//!   never block their callers and drain fully on shutdown
//! - **Captured events**: level, template, arguments, marker, error, thread,
//!   location and diagnostic context are snapshotted on the calling thread
//! - **Sinks**: console, file, JSON lines and in-memory outputs
//!
//! ## Example
//!
//! ```
//! use log_relay::prelude::*;
//!
//! let sink = MemorySink::new();
//! let received = sink.handle();
//!
//! let relay = BoundedRelay::builder().capacity(128).sink(sink).build();
//! relay.start().unwrap();
//! relay.submit(Event::new(LogLevel::Info, "user {} logged in").with_args(["alice"])).unwrap();
//!
//! assert!(received.wait_for(1, std::time::Duration::from_secs(1)));
//! relay.stop().unwrap();
//! assert_eq!(received.messages(), vec!["user alice logged in"]);
//! ```

pub mod backend;
pub mod core;
pub mod macros;
pub mod relay;
pub mod sinks;

pub mod prelude {
    pub use crate::backend::{Backend, LevelFilter, SinkBackend};
    pub use crate::core::{
        CancellationToken, DiagnosticContext, ErrorInfo, Event, FieldValue, LogContext, LogLevel,
        Marker, RelayConfig, RelayError, RelayMetrics, Result, Sink, SinkId,
    };
    pub use crate::relay::{
        BoundedRelay, BoundedRelayBuilder, GlobalRelay, RelayLogger, RelayState, ShutdownGuard,
    };
    pub use crate::sinks::{ConsoleSink, FileSink, JsonSink, MemoryHandle, MemorySink};
}

pub use backend::{Backend, LevelFilter, SinkBackend};
pub use core::{
    CancellationToken, ContextGuard, DiagnosticContext, ErrorInfo, Event, FieldValue, LogContext,
    LogLevel, Marker, RelayConfig, RelayError, RelayMetrics, Result, Sink, SinkId,
};
pub use relay::{
    get_logger, init, shutdown, BoundedRelay, BoundedRelayBuilder, GlobalRelay, RelayLogger,
    RelayState, ShutdownGuard,
};
pub use sinks::{ConsoleSink, FileSink, JsonSink, MemoryHandle, MemorySink};
