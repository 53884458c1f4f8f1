//! Per-name logger handed out by the global relay

use super::global::RelayCore;
use crate::core::{ErrorInfo, Event, FieldValue, LogLevel, Marker};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Lightweight per-name logger
///
/// The enablement check runs synchronously on the caller's thread; a disabled
/// call returns without building an event. Accepted calls are captured by
/// value into an [`Event`] and queued on the global relay, which never blocks.
///
/// For every level there is a predicate pair and four call shapes, e.g. for
/// `info`: `is_info_enabled`, `is_info_enabled_for(&marker)`,
/// `info(msg)`, `info_args(template, args)`, `info_error(template, args, &err)`
/// and `info_marker(&marker, template, args)`.
pub struct RelayLogger {
    name: Arc<str>,
    core: Arc<RelayCore>,
}

macro_rules! level_methods {
    ($level:expr, $plain:ident, $args:ident, $error:ident, $marker:ident, $enabled:ident, $enabled_for:ident) => {
        #[inline]
        pub fn $enabled(&self) -> bool {
            self.is_enabled($level)
        }

        #[inline]
        pub fn $enabled_for(&self, marker: &Marker) -> bool {
            self.is_enabled_for($level, marker)
        }

        #[track_caller]
        pub fn $plain(&self, message: &str) {
            self.log($level, message, &[]);
        }

        #[track_caller]
        pub fn $args(&self, template: &str, args: &[FieldValue]) {
            self.log($level, template, args);
        }

        #[track_caller]
        pub fn $error(&self, template: &str, args: &[FieldValue], error: &dyn Error) {
            self.log_error($level, template, args, error);
        }

        #[track_caller]
        pub fn $marker(&self, marker: &Marker, template: &str, args: &[FieldValue]) {
            self.log_marker($level, marker, template, args);
        }
    };
}

impl RelayLogger {
    pub(crate) fn new(name: Arc<str>, core: Arc<RelayCore>) -> Self {
        Self { name, core }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.core.backend().is_enabled(&self.name, level, None)
    }

    pub fn is_enabled_for(&self, level: LogLevel, marker: &Marker) -> bool {
        self.core.backend().is_enabled(&self.name, level, Some(marker))
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, template: &str, args: &[FieldValue]) {
        self.capture(level, None, template, args, None);
    }

    #[track_caller]
    pub fn log_marker(&self, level: LogLevel, marker: &Marker, template: &str, args: &[FieldValue]) {
        self.capture(level, Some(marker), template, args, None);
    }

    #[track_caller]
    pub fn log_error(&self, level: LogLevel, template: &str, args: &[FieldValue], error: &dyn Error) {
        self.capture(level, None, template, args, Some(error));
    }

    #[track_caller]
    pub fn log_marker_error(
        &self,
        level: LogLevel,
        marker: &Marker,
        template: &str,
        args: &[FieldValue],
        error: &dyn Error,
    ) {
        self.capture(level, Some(marker), template, args, Some(error));
    }

    #[track_caller]
    fn capture(
        &self,
        level: LogLevel,
        marker: Option<&Marker>,
        template: &str,
        args: &[FieldValue],
        error: Option<&dyn Error>,
    ) {
        if !self.core.backend().is_enabled(&self.name, level, marker) {
            return;
        }

        let mut event = Event::new(level, template)
            .with_target(self.name.as_ref())
            .with_args(args.iter().cloned());
        if let Some(marker) = marker {
            event = event.with_marker(marker.clone());
        }
        if let Some(error) = error {
            event = event.with_error(ErrorInfo::capture(error));
        }
        self.core.enqueue(event.freeze());
    }

    level_methods!(LogLevel::Trace, trace, trace_args, trace_error, trace_marker, is_trace_enabled, is_trace_enabled_for);
    level_methods!(LogLevel::Debug, debug, debug_args, debug_error, debug_marker, is_debug_enabled, is_debug_enabled_for);
    level_methods!(LogLevel::Info, info, info_args, info_error, info_marker, is_info_enabled, is_info_enabled_for);
    level_methods!(LogLevel::Warn, warn, warn_args, warn_error, warn_marker, is_warn_enabled, is_warn_enabled_for);
    level_methods!(LogLevel::Error, error, error_args, error_error, error_marker, is_error_enabled, is_error_enabled_for);
    level_methods!(LogLevel::Fatal, fatal, fatal_args, fatal_error, fatal_marker, is_fatal_enabled, is_fatal_enabled_for);
}

impl fmt::Debug for RelayLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayLogger").field("name", &self.name).finish()
    }
}
