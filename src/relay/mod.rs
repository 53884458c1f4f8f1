//! Relays that move events from producer threads to sinks

pub mod bounded;
pub mod facade;
pub mod global;
pub mod registry;

pub use bounded::{BoundedRelay, BoundedRelayBuilder, RelayState};
pub use facade::RelayLogger;
pub use global::{get_logger, global, init, shutdown, GlobalRelay, ShutdownGuard, GLOBAL_WORKER_NAME};
pub use registry::Registry;
