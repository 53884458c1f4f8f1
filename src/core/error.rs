//! Error types for the relay

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Relay cannot start with the given configuration
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// A blocking queue operation was abandoned because cancellation was requested
    #[error("Operation cancelled while waiting on the relay queue")]
    Cancelled,

    /// Operation not valid in the relay's current lifecycle state
    #[error("Cannot {operation} a relay in state {state}")]
    InvalidState { operation: String, state: String },

    /// Process-wide relay was installed twice
    #[error("Global relay already initialized")]
    AlreadyInitialized,

    /// Worker thread could not be spawned
    #[error("Failed to spawn worker thread '{name}': {source}")]
    WorkerSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Sink failed to accept an event
    #[error("Sink '{sink}' failed: {message}")]
    SinkError { sink: String, message: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        RelayError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an invalid lifecycle state error
    pub fn invalid_state(operation: impl Into<String>, state: impl ToString) -> Self {
        RelayError::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }

    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        RelayError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a sink error
    pub fn sink(sink: impl Into<String>, message: impl Into<String>) -> Self {
        RelayError::SinkError {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        RelayError::Other(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RelayError::Cancelled)
    }
}
