//! Per-key in-flight guards.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::hash::Hash;

/// Set of keys with an operation in flight.
///
/// `try_acquire` hands out at most one guard per key; the key is released
/// when the guard drops, whichever way the operation ends.
pub(crate) struct KeyedLocks<K: Eq + Hash> {
    held: Mutex<HashSet<K>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn try_acquire(&self, key: K) -> Option<KeyGuard<'_, K>> {
        if self.held.lock().insert(key.clone()) {
            Some(KeyGuard { locks: self, key })
        } else {
            None
        }
    }

    pub(crate) fn is_held(&self, key: &K) -> bool {
        self.held.lock().contains(key)
    }
}

pub(crate) struct KeyGuard<'a, K: Eq + Hash> {
    locks: &'a KeyedLocks<K>,
    key: K,
}

impl<K: Eq + Hash> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.key);
    }
}
