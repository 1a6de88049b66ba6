//! Reentrant External-Input Gate
//!
//! A lock map keyed by resource id. A gated resource's host checks
//! [`Gate::is_locked`] before applying its own default handling of an
//! external signal, so scripted sequences can drive a widget without the
//! widget also reacting on its own.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

/// A lock map with per-key hit counters.
///
/// Locking with `hits_to_unlock == 0` requires a manual [`Gate::unlock`];
/// a positive count unlocks automatically after that many [`Gate::hit`]
/// calls. Cloning produces another handle to the same map.
#[derive(Debug, Default)]
pub struct Gate<K> {
    locks: Arc<Mutex<HashMap<K, u32>>>,
}

impl<K> Clone for Gate<K> {
    fn clone(&self) -> Self {
        Self {
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<K: Eq + Hash> Gate<K> {
    /// Create a new, empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Lock a key. `hits_to_unlock == 0` means manual unlock only.
    ///
    /// Locking an already locked key resets its hit counter.
    pub fn lock(&self, key: K, hits_to_unlock: u32) {
        self.locks.lock().insert(key, hits_to_unlock);
    }

    /// Unlock a key. Unlocking a key that is not locked is a no-op.
    pub fn unlock(&self, key: &K) {
        self.locks.lock().remove(key);
    }

    /// Whether a key is currently locked.
    #[must_use]
    pub fn is_locked(&self, key: &K) -> bool {
        self.locks.lock().contains_key(key)
    }

    /// Register a hit against a locked key.
    ///
    /// When the remaining hit count reaches zero the key unlocks. Hits on
    /// unlocked keys and on manually locked keys are no-ops.
    pub fn hit(&self, key: &K) {
        let mut locks = self.locks.lock();
        let Some(remaining) = locks.get_mut(key) else {
            return;
        };
        match *remaining {
            0 => {}
            1 => {
                locks.remove(key);
            }
            _ => *remaining -= 1,
        }
    }
}
