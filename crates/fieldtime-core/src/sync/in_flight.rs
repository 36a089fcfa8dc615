//! Per-entry guard against concurrent pushes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::models::EntryId;

/// Entries with a remote call in progress.
#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    ids: Arc<Mutex<HashSet<EntryId>>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`. Returns `None` when another task already holds it.
    pub fn try_acquire(&self, id: EntryId) -> Option<InFlightGuard> {
        let inserted = self
            .ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        inserted.then(|| InFlightGuard {
            ids: Arc::clone(&self.ids),
            id,
        })
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its entry when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<EntryId>>>,
    id: EntryId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
