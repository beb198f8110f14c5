//! Per-target write serialization.
//!
//! Every mutating operation on an account or card runs as a single atomic
//! unit: read balance, validate, write balance and append the ledger row.
//! The registry hands out one mutex per target id; engines hold it for the
//! whole read-modify-write so two concurrent mutations of the same target
//! can never both read the same pre-mutation balance. The stores' version
//! checks remain as a backstop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The serializing lock for `target`, created lazily on first use.
    pub fn target_lock(&self, target: Uuid) -> Arc<Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(target).or_default().clone()
    }
}

/// Lock a target mutex, recovering from poisoning.
///
/// The guarded value is `()`; a panicking holder cannot leave it in a bad
/// state, so recovering the lock is always sound.
pub fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
