//! Event: an owned snapshot of one log call
//!
//! Everything an event refers to is captured by value when it is built, so it
//! can sit in a queue for an arbitrary time and still replay exactly what the
//! caller asked for. Events are assembled with the consuming `with_*` methods
//! and are read-only once handed to a relay.

use super::log_context::{DiagnosticContext, FieldValue, LogContext};
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

fn current_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

fn current_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Escape line breaks so one event always renders as one line
pub fn sanitize_message(message: &str) -> Cow<'_, str> {
    if message.contains(['\n', '\r', '\t']) {
        Cow::Owned(
            message
                .replace('\n', "\\n")
                .replace('\r', "\\r")
                .replace('\t', "\\t"),
        )
    } else {
        Cow::Borrowed(message)
    }
}

/// Named tag used by backends for filtering and routing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marker {
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    references: Vec<Marker>,
}

impl Marker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            references: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_reference(mut self, child: Marker) -> Self {
        self.references.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn references(&self) -> &[Marker] {
        &self.references
    }

    /// True if this marker or any marker it references has the given name
    pub fn contains(&self, name: &str) -> bool {
        self.name == name || self.references.iter().any(|m| m.contains(name))
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Owned copy of an error and its source chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Capture an error's message and the messages of its sources
    pub fn capture(error: &dyn std::error::Error) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            causes,
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for cause in &self.causes {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

/// Source location of the log call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    level: LogLevel,
    template: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    marker: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
    timestamp: DateTime<Utc>,
    thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thread_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<LogContext>,
    #[serde(skip)]
    frozen: bool,
}

impl Event {
    /// Capture a new event at the caller's location
    #[track_caller]
    pub fn new(level: LogLevel, template: impl Into<String>) -> Self {
        let caller = std::panic::Location::caller();
        Self {
            target: None,
            level,
            template: template.into(),
            args: Vec::new(),
            marker: None,
            error: None,
            timestamp: Utc::now(),
            thread_id: current_thread_id(),
            thread_name: current_thread_name(),
            location: Some(Location {
                file: caller.file().to_string(),
                line: caller.line(),
                module_path: None,
            }),
            context: None,
            frozen: false,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn with_location(mut self, file: &str, line: u32, module_path: &str) -> Self {
        self.location = Some(Location {
            file: file.to_string(),
            line,
            module_path: Some(module_path.to_string()),
        });
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: LogContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Snapshot the producer thread's diagnostic context into the event
    ///
    /// Must run on the thread that emitted the event, before it is queued.
    /// Fields set directly on the event win over diagnostic fields. Freezing
    /// twice is a no-op.
    #[must_use]
    pub fn freeze(mut self) -> Self {
        if self.frozen {
            return self;
        }
        let diagnostic = DiagnosticContext::snapshot();
        if !diagnostic.is_empty() {
            match self.context.as_mut() {
                Some(context) => context.merge_missing(&diagnostic),
                None => self.context = Some(diagnostic),
            }
        }
        self.frozen = true;
        self
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn args(&self) -> &[FieldValue] {
        &self.args
    }

    pub fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// Thread name if set, otherwise its id
    pub fn thread_label(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(&self.thread_id)
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn context(&self) -> Option<&LogContext> {
        self.context.as_ref()
    }

    /// Substitute each `{}` in the template with the next argument
    ///
    /// `\{}` renders a literal `{}`. Placeholders without a matching argument
    /// are kept as-is; surplus arguments are ignored.
    pub fn render(&self) -> Cow<'_, str> {
        if self.args.is_empty() && !self.template.contains("\\{}") {
            return Cow::Borrowed(&self.template);
        }

        let mut out = String::with_capacity(self.template.len() + self.args.len() * 8);
        let mut args = self.args.iter();
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find("{}") {
            let (before, after) = rest.split_at(pos);
            if let Some(stripped) = before.strip_suffix('\\') {
                out.push_str(stripped);
                out.push_str("{}");
            } else {
                out.push_str(before);
                match args.next() {
                    Some(arg) => out.push_str(&arg.to_string()),
                    None => out.push_str("{}"),
                }
            }
            rest = &after[2..];
        }
        out.push_str(rest);
        Cow::Owned(out)
    }
}
