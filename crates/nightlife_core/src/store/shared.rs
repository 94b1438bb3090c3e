//! Shared, observable store handle.

use super::EntityStore;
use crate::change_feed::{ChangeEvent, ChangeFeed, Interest};
use crate::entity::Entity;
use crate::snapshot::StoreSnapshot;
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// The single shared mutable resource: an [`EntityStore`] behind a lock,
/// plus the change feed its writes are published on.
///
/// Only the sync engine and the mutation pipeline write; presentation code
/// gets a [`StoreView`].
pub struct Store {
    state: RwLock<EntityStore>,
    feed: ChangeFeed,
    sequence: AtomicU64,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_feed_history(1024)
    }

    /// Creates an empty store whose feed keeps `history` events for polling.
    pub fn with_feed_history(history: usize) -> Self {
        Self {
            state: RwLock::new(EntityStore::new()),
            feed: ChangeFeed::with_max_history(history),
            sequence: AtomicU64::new(0),
        }
    }

    /// Read access to the current contents.
    pub fn read(&self) -> RwLockReadGuard<'_, EntityStore> {
        self.state.read()
    }

    /// Runs `f` with write access and publishes the changes it recorded.
    ///
    /// Events are sequenced and sent before the write lock is released, so
    /// subscribers observe them in commit order.
    pub fn write<R>(&self, f: impl FnOnce(&mut EntityStore) -> R) -> R {
        let mut state = self.state.write();
        let result = f(&mut state);
        let changes = state.take_changes();
        if !changes.is_empty() {
            let events = changes
                .into_iter()
                .map(|change| {
                    let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                    ChangeEvent::sequenced(sequence, change)
                })
                .collect();
            self.feed.emit_batch(events);
        }
        result
    }

    /// Subscribes to changes matching `interest`.
    pub fn subscribe(&self, interest: Interest) -> Receiver<ChangeEvent> {
        self.feed.subscribe(interest)
    }

    /// The change feed.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Sequence number of the most recent change.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Captures the current contents.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.read().snapshot()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("total_count", &self.read().total_count())
            .field("sequence", &self.sequence())
            .finish_non_exhaustive()
    }
}

/// Read-only handle to a [`Store`].
#[derive(Clone)]
pub struct StoreView {
    store: Arc<Store>,
}

impl StoreView {
    /// Wraps a shared store.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Read access to the current contents.
    pub fn read(&self) -> RwLockReadGuard<'_, EntityStore> {
        self.store.read()
    }

    /// Clones every entity of type `T`.
    pub fn list<T: Entity>(&self) -> Vec<T> {
        self.store.read().list_all::<T>().to_vec()
    }

    /// Clones one entity by id.
    pub fn get_by_id<T: Entity>(&self, id: &str) -> Option<T> {
        self.store.read().get_by_id::<T>(id).cloned()
    }

    /// Clones one entity by slug.
    pub fn get_by_slug<T: Entity>(&self, slug: &str) -> Option<T> {
        self.store.read().get_by_slug::<T>(slug).cloned()
    }

    /// Subscribes to changes matching `interest`.
    pub fn subscribe(&self, interest: Interest) -> Receiver<ChangeEvent> {
        self.store.subscribe(interest)
    }

    /// Sequence number of the most recent change.
    pub fn sequence(&self) -> u64 {
        self.store.sequence()
    }
}

impl std::fmt::Debug for StoreView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StoreView").field(&self.store).finish()
    }
}
