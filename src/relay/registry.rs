//! Memoizing name -> logger cache

use super::facade::RelayLogger;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Cache of façades by logger name
///
/// Entries are created on first request and live as long as the registry.
/// Concurrent first lookups of the same name agree on a single instance.
#[derive(Default)]
pub struct Registry {
    loggers: RwLock<HashMap<Arc<str>, Arc<RelayLogger>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached logger for `name`, creating it with `make` if absent
    ///
    /// `make` runs at most once per name.
    pub fn get_or_create<F>(&self, name: &str, make: F) -> Arc<RelayLogger>
    where
        F: FnOnce(Arc<str>) -> RelayLogger,
    {
        if let Some(logger) = self.loggers.read().get(name) {
            return Arc::clone(logger);
        }

        let mut loggers = self.loggers.write();
        // Another thread may have won the race between the two locks.
        if let Some(logger) = loggers.get(name) {
            return Arc::clone(logger);
        }
        let key: Arc<str> = Arc::from(name);
        let logger = Arc::new(make(Arc::clone(&key)));
        loggers.insert(key, Arc::clone(&logger));
        logger
    }

    pub fn get(&self, name: &str) -> Option<Arc<RelayLogger>> {
        self.loggers.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.loggers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.read().is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loggers.read().keys().map(|k| k.to_string()).collect();
        names.sort();
        names
    }
}
