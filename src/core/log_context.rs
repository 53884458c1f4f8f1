//! Argument values and structured context for relayed events
//!
//! This module provides:
//! - `FieldValue`: an owned argument or field value, captured by value at the call site
//! - `LogContext`: structured key-value fields attached to one event
//! - `DiagnosticContext`: thread-scoped fields that are snapshotted into an
//!   event when it is frozen for queueing
//! - `ContextGuard`: RAII guard for a scoped diagnostic field

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Value type for event arguments and structured fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::UInt(u) => write!(f, "{}", u),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl FieldValue {
    /// Capture any displayable value as its rendered string
    pub fn display(value: impl fmt::Display) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<&String> for FieldValue {
    fn from(s: &String) -> Self {
        FieldValue::String(s.clone())
    }
}

impl From<char> for FieldValue {
    fn from(c: char) -> Self {
        FieldValue::String(c.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<u64> for FieldValue {
    fn from(u: u64) -> Self {
        FieldValue::UInt(u)
    }
}

impl From<u32> for FieldValue {
    fn from(u: u32) -> Self {
        FieldValue::UInt(u64::from(u))
    }
}

impl From<usize> for FieldValue {
    fn from(u: usize) -> Self {
        FieldValue::UInt(u as u64)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Structured key-value fields attached to an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogContext {
    fields: HashMap<String, FieldValue>,
}

impl LogContext {
    /// Create a new empty log context
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Add a field to the context
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add a field to the context (mutable version)
    pub fn add_field<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Get all fields
    pub fn fields(&self) -> &HashMap<String, FieldValue> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Copy fields from `other` that are not already present
    ///
    /// Fields already on this context take priority.
    pub fn merge_missing(&mut self, other: &LogContext) {
        for (key, value) in &other.fields {
            self.fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Format fields as key=value pairs, sorted by key
    pub fn format_fields(&self) -> String {
        let mut pairs: Vec<_> = self.fields.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_fields())
    }
}

thread_local! {
    static DIAGNOSTIC_FIELDS: RefCell<HashMap<String, FieldValue>> = RefCell::new(HashMap::new());
}

/// Thread-scoped diagnostic fields
///
/// Values set here belong to the calling thread only. An event snapshots the
/// current values when it is frozen on the producer's thread, so the worker
/// thread never observes a later (or another thread's) state.
///
/// # Example
///
/// ```
/// use log_relay::core::DiagnosticContext;
///
/// {
///     let _guard = DiagnosticContext::scoped("request_id", "abc-123");
///     assert_eq!(DiagnosticContext::snapshot().len(), 1);
/// }
/// assert!(DiagnosticContext::snapshot().is_empty());
/// ```
pub struct DiagnosticContext;

impl DiagnosticContext {
    /// Set a field for the current thread, overwriting any previous value
    pub fn put<K, V>(key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        DIAGNOSTIC_FIELDS.with(|fields| {
            fields.borrow_mut().insert(key.into(), value.into());
        });
    }

    pub fn get(key: &str) -> Option<FieldValue> {
        DIAGNOSTIC_FIELDS.with(|fields| fields.borrow().get(key).cloned())
    }

    /// Remove a field from the current thread, returning its old value
    pub fn remove(key: &str) -> Option<FieldValue> {
        DIAGNOSTIC_FIELDS.with(|fields| fields.borrow_mut().remove(key))
    }

    pub fn clear() {
        DIAGNOSTIC_FIELDS.with(|fields| fields.borrow_mut().clear());
    }

    /// Copy the current thread's fields into an owned context
    pub fn snapshot() -> LogContext {
        DIAGNOSTIC_FIELDS.with(|fields| LogContext {
            fields: fields.borrow().clone(),
        })
    }

    /// Set a field until the returned guard is dropped
    ///
    /// The previous value, if any, is restored when the guard goes away.
    #[must_use = "the field is removed as soon as the guard is dropped"]
    pub fn scoped<K, V>(key: K, value: V) -> ContextGuard
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let key = key.into();
        let previous = DIAGNOSTIC_FIELDS
            .with(|fields| fields.borrow_mut().insert(key.clone(), value.into()));
        ContextGuard {
            key,
            previous,
            _not_send: PhantomData,
        }
    }
}

/// RAII guard for a scoped diagnostic field
///
/// Bound to the thread that created it.
pub struct ContextGuard {
    key: String,
    previous: Option<FieldValue>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        DIAGNOSTIC_FIELDS.with(|fields| {
            let mut fields = fields.borrow_mut();
            match previous {
                Some(value) => {
                    fields.insert(std::mem::take(&mut self.key), value);
                }
                None => {
                    fields.remove(&self.key);
                }
            }
        });
    }
}
