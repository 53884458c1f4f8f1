//! The real logging backend behind the global relay
//!
//! A [`Backend`] answers the cheap "is this enabled" question on the caller's
//! thread and performs the actual emit on the relay's worker thread.

use crate::core::{
    Event, LogLevel, Marker, RelayError, Result, Sink, SinkId, SinkSet,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

pub trait Backend: Send + Sync {
    /// Whether an event at `level` for `target` would be emitted
    ///
    /// Called synchronously on the producer's thread for every log call, so
    /// it must be cheap and must not block.
    fn is_enabled(&self, target: &str, level: LogLevel, marker: Option<&Marker>) -> bool;

    /// Emit one event; called only from the relay's worker thread
    fn emit(&self, event: &Event) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Called once after the worker has drained the queue
    fn shutdown(&self) -> Result<()> {
        self.flush()
    }
}

/// Per-target severity thresholds
///
/// Targets are hierarchical names separated by `::` or `.`; the most
/// specific configured prefix decides. Events carrying a denied marker are
/// disabled regardless of level.
///
/// # Example
///
/// ```
/// use log_relay::{LevelFilter, LogLevel};
///
/// let filter = LevelFilter::new(LogLevel::Warn).with_target("app::db", LogLevel::Debug);
///
/// assert!(filter.enabled("app::db::pool", LogLevel::Debug, None));
/// assert!(!filter.enabled("app::http", LogLevel::Info, None));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelFilter {
    pub default: LogLevel,
    pub targets: HashMap<String, LogLevel>,
    pub denied_markers: HashSet<String>,
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl LevelFilter {
    pub fn new(default: LogLevel) -> Self {
        Self {
            default,
            targets: HashMap::new(),
            denied_markers: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_target(mut self, prefix: impl Into<String>, level: LogLevel) -> Self {
        self.targets.insert(prefix.into(), level);
        self
    }

    #[must_use]
    pub fn deny_marker(mut self, name: impl Into<String>) -> Self {
        self.denied_markers.insert(name.into());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Threshold that applies to `target`
    pub fn threshold(&self, target: &str) -> LogLevel {
        self.targets
            .iter()
            .filter(|(prefix, _)| covers(prefix, target))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(self.default, |(_, level)| *level)
    }

    pub fn enabled(&self, target: &str, level: LogLevel, marker: Option<&Marker>) -> bool {
        if let Some(marker) = marker {
            if self.denied_markers.iter().any(|name| marker.contains(name)) {
                return false;
            }
        }
        level >= self.threshold(target)
    }
}

fn covers(prefix: &str, target: &str) -> bool {
    match target.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => prefix.is_empty() || rest.starts_with("::") || rest.starts_with('.'),
        None => false,
    }
}

/// Backend that writes accepted events to a set of sinks
///
/// Sinks are started as they are attached and stopped when the relay
/// shuts the backend down.
pub struct SinkBackend {
    filter: RwLock<LevelFilter>,
    sinks: SinkSet,
}

impl SinkBackend {
    pub fn new(filter: LevelFilter) -> Self {
        Self {
            filter: RwLock::new(filter),
            sinks: SinkSet::new(),
        }
    }

    /// Start `sink` and append it
    pub fn attach(&self, mut sink: Box<dyn Sink>) -> Result<SinkId> {
        sink.start()?;
        Ok(self.sinks.attach(sink))
    }

    /// Builder-style [`attach`](Self::attach)
    pub fn with_sink<S: Sink + 'static>(self, sink: S) -> Result<Self> {
        self.attach(Box::new(sink))?;
        Ok(self)
    }

    pub fn detach(&self, id: SinkId) -> Option<Box<dyn Sink>> {
        self.sinks.detach(id)
    }

    pub fn set_filter(&self, filter: LevelFilter) {
        *self.filter.write() = filter;
    }

    pub fn filter(&self) -> LevelFilter {
        self.filter.read().clone()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Backend for SinkBackend {
    fn is_enabled(&self, target: &str, level: LogLevel, marker: Option<&Marker>) -> bool {
        self.filter.read().enabled(target, level, marker)
    }

    fn emit(&self, event: &Event) -> Result<()> {
        let report = self.sinks.dispatch(event);
        if report.is_success() {
            Ok(())
        } else {
            Err(RelayError::sink(
                "SinkBackend",
                format!("{} of {} sinks failed", report.failed, report.failed + report.delivered),
            ))
        }
    }

    fn flush(&self) -> Result<()> {
        self.sinks.flush_all();
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.sinks.stop_all()
    }
}

impl fmt::Debug for SinkBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkBackend")
            .field("filter", &*self.filter.read())
            .field("sinks", &self.sinks)
            .finish()
    }
}
