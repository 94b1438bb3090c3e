//! Per-entity FIFO serialization of mutations.

use nightlife_core::{EntityId, EntityKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Key = (EntityKind, EntityId);

/// One async lock per `(kind, id)`, created on demand.
///
/// The tokio mutex is fair, so mutations of the same entity run in the order
/// they asked for the lock. An entry is dropped once nobody holds or waits
/// for it.
#[derive(Debug, Default)]
pub(crate) struct KeyedQueue {
    locks: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl KeyedQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Waits for the turn of `(kind, id)`.
    pub(crate) async fn acquire(&self, kind: EntityKind, id: &EntityId) -> Ticket<'_> {
        let key = (kind, id.clone());
        let lock = Arc::clone(self.locks.lock().entry(key.clone()).or_default());
        let guard = Arc::clone(&lock).lock_owned().await;
        Ticket {
            queue: self,
            key,
            lock,
            guard: Some(guard),
        }
    }

    /// Number of ids with a holder or waiter.
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Turn held on one entity; released on drop.
pub(crate) struct Ticket<'a> {
    queue: &'a KeyedQueue,
    key: Key,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.queue.locks.lock();
        // Map entry plus ours: nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}
