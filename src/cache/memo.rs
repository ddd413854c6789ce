//! Per-wrapper memo table.
//!
//! Interior mutability without locks: a table is owned by exactly one wrapper
//! and is `!Sync`, so the compiler rejects sharing it across threads.
//! Entries are never evicted; the table lives as long as its wrapper.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::key::CallKey;

/// Memo table mapping call keys to previously computed results.
pub struct MemoTable<R> {
    entries: RefCell<HashMap<CallKey, R>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
    bypassed: Cell<u64>,
}

impl<R> MemoTable<R> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            hits: Cell::new(0),
            misses: Cell::new(0),
            bypassed: Cell::new(0),
        }
    }

    /// Look up `key`, recording a hit or a miss.
    ///
    /// The borrow ends before this returns, so callers may invoke the wrapped
    /// function (or await it) without holding the table.
    pub fn lookup<T>(&self, key: &CallKey, project: impl FnOnce(&R) -> Option<T>) -> Option<T> {
        let found = self.entries.borrow().get(key).and_then(project);
        match found {
            Some(_) => self.hits.set(self.hits.get() + 1),
            None => self.misses.set(self.misses.get() + 1),
        }
        found
    }

    /// Store `value` under `key`. At most one entry exists per key.
    pub fn store(&self, key: CallKey, value: R) {
        self.entries.borrow_mut().insert(key, value);
    }

    /// Record a call that skipped the table.
    pub fn record_bypass(&self) {
        self.bypassed.set(self.bypassed.get() + 1);
    }

    pub fn contains(&self, key: &CallKey) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn stats(&self) -> MemoStats {
        MemoStats {
            entries: self.len(),
            hits: self.hits.get(),
            misses: self.misses.get(),
            bypassed: self.bypassed.get(),
        }
    }
}

impl<R> Default for MemoTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for one wrapper's memo table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoStats {
    /// Number of stored results.
    pub entries: usize,
    /// Calls answered from the table.
    pub hits: u64,
    /// Calls with a derived key that had to execute the function.
    pub misses: u64,
    /// Calls that skipped the table (key derivation failed or caching disabled).
    pub bypassed: u64,
}
