//! Logging macros for named relay loggers.
//!
//! Arguments are converted to [`FieldValue`](crate::FieldValue)s and rendered
//! into the `{}` placeholders of the template on the relay's worker thread.
//! Nothing is evaluated when the level is disabled for the logger.
//!
//! # Examples
//!
//! ```
//! use log_relay::prelude::*;
//! use log_relay::{relay_info, relay_warn};
//! use std::sync::Arc;
//!
//! let sink = MemorySink::new();
//! let received = sink.handle();
//! let backend = SinkBackend::new(LevelFilter::new(LogLevel::Info)).with_sink(sink).unwrap();
//! let relay = GlobalRelay::new(Arc::new(backend)).unwrap();
//! let logger = relay.get_logger("server");
//!
//! relay_info!(logger, "Server started");
//! relay_warn!(logger, "Port {} busy, trying {}", 8080, 8081);
//!
//! relay.shutdown();
//! assert_eq!(received.messages(), vec!["Server started", "Port 8080 busy, trying 8081"]);
//! ```

/// Log at an explicit level.
///
/// Optional `marker: <expr>` and `error: <expr>` prefixes attach a
/// [`Marker`](crate::Marker) reference and a `&dyn Error`.
///
/// # Examples
///
/// ```
/// # use log_relay::prelude::*;
/// # use std::sync::Arc;
/// # let backend = SinkBackend::new(LevelFilter::new(LogLevel::Trace)).with_sink(MemorySink::new()).unwrap();
/// # let relay = GlobalRelay::new(Arc::new(backend)).unwrap();
/// # let logger = relay.get_logger("db");
/// use log_relay::relay_log;
/// let audit = Marker::new("AUDIT");
/// let err = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
///
/// relay_log!(logger, LogLevel::Info, "Simple message");
/// relay_log!(logger, LogLevel::Error, "Error code: {}", 500);
/// relay_log!(logger, LogLevel::Warn, marker: &audit, "user {} dropped table", "root");
/// relay_log!(logger, LogLevel::Error, error: &err, "query {} failed", 17);
/// ```
#[macro_export]
macro_rules! relay_log {
    ($logger:expr, $level:expr, marker: $marker:expr, error: $error:expr, $template:expr $(, $arg:expr)* $(,)?) => {{
        let logger = &$logger;
        let level = $level;
        let marker: &$crate::Marker = $marker;
        if logger.is_enabled_for(level, marker) {
            logger.log_marker_error(
                level,
                marker,
                $template,
                &[$($crate::FieldValue::from($arg)),*],
                $error,
            );
        }
    }};
    ($logger:expr, $level:expr, marker: $marker:expr, $template:expr $(, $arg:expr)* $(,)?) => {{
        let logger = &$logger;
        let level = $level;
        let marker: &$crate::Marker = $marker;
        if logger.is_enabled_for(level, marker) {
            logger.log_marker(level, marker, $template, &[$($crate::FieldValue::from($arg)),*]);
        }
    }};
    ($logger:expr, $level:expr, error: $error:expr, $template:expr $(, $arg:expr)* $(,)?) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled(level) {
            logger.log_error(level, $template, &[$($crate::FieldValue::from($arg)),*], $error);
        }
    }};
    ($logger:expr, $level:expr, $template:expr $(, $arg:expr)* $(,)?) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled(level) {
            logger.log(level, $template, &[$($crate::FieldValue::from($arg)),*]);
        }
    }};
}

/// Log a trace-level message.
#[macro_export]
macro_rules! relay_trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::relay_log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! relay_debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::relay_log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use log_relay::prelude::*;
/// # use std::sync::Arc;
/// # let backend = SinkBackend::new(LevelFilter::new(LogLevel::Info)).with_sink(MemorySink::new()).unwrap();
/// # let relay = GlobalRelay::new(Arc::new(backend)).unwrap();
/// # let logger = relay.get_logger("app");
/// use log_relay::relay_info;
/// relay_info!(logger, "Application started");
/// relay_info!(logger, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! relay_info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::relay_log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! relay_warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::relay_log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! relay_error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::relay_log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
#[macro_export]
macro_rules! relay_fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::relay_log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}
