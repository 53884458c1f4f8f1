//! Bounded relay configuration

use super::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default queue capacity of a bounded relay
pub const DEFAULT_CAPACITY: usize = 50_000;

/// Default name of relay worker threads
pub const DEFAULT_WORKER_NAME: &str = "log-relay";

/// Settings for a [`BoundedRelay`](crate::BoundedRelay)
///
/// Values are checked when the relay starts, not when the config is built,
/// so an invalid capacity surfaces as a start failure.
///
/// # Example
///
/// ```
/// use log_relay::RelayConfig;
///
/// let config = RelayConfig::from_json_str(r#"{ "capacity": 128 }"#).unwrap();
/// assert_eq!(config.capacity, 128);
/// assert!(config.capture_context);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximum number of queued events before submitters block
    pub capacity: usize,

    /// Name given to the worker thread
    pub worker_name: String,

    /// Snapshot the producer's diagnostic context into each queued event
    pub capture_context: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            capture_context: true,
        }
    }
}

impl RelayConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::io_operation(
                "reading relay config",
                format!("cannot read '{}'", path.display()),
                e,
            )
        })?;
        Self::from_json_str(&content)
    }

    /// Check the settings a relay needs before it can start
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(RelayError::config(
                "BoundedRelay",
                "capacity must be at least 1",
            ));
        }
        if self.worker_name.is_empty() {
            return Err(RelayError::config(
                "BoundedRelay",
                "worker name must not be empty",
            ));
        }
        Ok(())
    }
}
