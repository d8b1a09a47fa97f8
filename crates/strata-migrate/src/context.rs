//! Per-run migration context
//!
//! The only channel between the `before` and `after` phases. One instance
//! per schema change event; entries are keyed by migration id.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Typed, key-scoped payload map for one migration run
#[derive(Default)]
pub struct MigrationContext {
    entries: HashMap<String, Box<dyn Any + Send + Sync>>,
    poisoned: HashSet<String>,
}

impl MigrationContext {
    /// Create empty context
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload, replacing any previous one under `key`
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Box::new(value));
    }

    /// Borrow the payload under `key` if it has type `T`
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.downcast_ref::<T>()
    }

    /// Remove and return the payload under `key` if it has type `T`
    ///
    /// A payload of another type stays in place.
    pub fn take<T: Any + Send + Sync>(&mut self, key: &str) -> Option<T> {
        let entry = self.entries.remove(key)?;
        match entry.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(entry) => {
                self.entries.insert(key.to_string(), entry);
                None
            }
        }
    }

    /// Check if a payload exists under `key`
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Mark a key whose capture failed; its payload is discarded
    pub fn poison(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.entries.remove(&key);
        self.poisoned.insert(key);
    }

    /// Check if `key` was poisoned
    #[inline]
    #[must_use]
    pub fn is_poisoned(&self, key: &str) -> bool {
        self.poisoned.contains(key)
    }

    /// Number of payloads held
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no payload is held
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MigrationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationContext")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}
