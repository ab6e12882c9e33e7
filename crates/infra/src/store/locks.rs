use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::r#trait::{LockKey, LockScope, StoreError};

/// Per-key exclusive locks for units of work.
///
/// A scope is acquired all-or-nothing: a caller waits until none of its keys
/// are held and then takes all of them at once, so two units can never each
/// hold part of the other's scope.
#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every key in `scope`, waiting at most `timeout`.
    pub fn acquire(&self, scope: &LockScope, timeout: Duration) -> Result<LockGuard<'_>, StoreError> {
        let started = Instant::now();
        let deadline = started + timeout;

        let mut held = self
            .held
            .lock()
            .map_err(|_| StoreError::Poisoned("lock table".to_string()))?;

        while scope.keys().any(|k| held.contains(k)) {
            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::LockTimeout {
                    waited: now - started,
                    keys: scope.describe(),
                });
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| StoreError::Poisoned("lock table".to_string()))?;
            held = guard;
        }

        let keys: Vec<LockKey> = scope.keys().cloned().collect();
        for key in &keys {
            held.insert(key.clone());
        }

        Ok(LockGuard { table: self, keys })
    }

    /// Number of keys currently held.
    pub fn held_count(&self) -> usize {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Releases its keys on drop.
#[derive(Debug)]
pub struct LockGuard<'a> {
    table: &'a LockTable,
    keys: Vec<LockKey>,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        // Release even if another holder panicked.
        let mut held = self
            .table
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.table.released.notify_all();
    }
}
