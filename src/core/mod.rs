//! Core relay types and traits

pub mod cancellation;
pub mod config;
pub mod error;
pub mod event;
pub mod log_context;
pub mod log_level;
pub mod metrics;
pub mod queue;
pub mod sink;
pub mod sink_set;

pub use cancellation::CancellationToken;
pub use config::{RelayConfig, DEFAULT_CAPACITY, DEFAULT_WORKER_NAME};
pub use error::{RelayError, Result};
pub use event::{sanitize_message, ErrorInfo, Event, Location, Marker};
pub use log_context::{ContextGuard, DiagnosticContext, FieldValue, LogContext};
pub use log_level::LogLevel;
pub use metrics::RelayMetrics;
pub use queue::{Abandoned, EventQueue, QueuePolicy};
pub use sink::Sink;
pub use sink_set::{DispatchReport, SinkId, SinkSet};
