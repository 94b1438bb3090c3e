//! Change feed for observing store mutations.
//!
//! Every completed write to the [`Store`](crate::Store) emits one event per
//! affected entity. Subscribers register an [`Interest`] and only receive
//! events that match it, so a detail page watching one club is not woken
//! by edits to unrelated DJs.
//!
//! # Usage
//!
//! ```rust,ignore
//! use nightlife_core::{EntityKind, Interest, Store};
//!
//! let store = Store::new();
//! let receiver = store.subscribe(Interest::Kind(EntityKind::Club));
//!
//! std::thread::spawn(move || {
//!     while let Ok(event) = receiver.recv() {
//!         println!("club changed: {:?}", event);
//!     }
//! });
//! ```

use crate::entity::EntityId;
use crate::types::EntityKind;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// Type of change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeType {
    /// Entity was inserted.
    Insert,
    /// Entity was replaced with a new version.
    Update,
    /// Entity was removed.
    Delete,
    /// Entity id changed (temporary id swapped for the backend id).
    Rekey {
        /// The previous id.
        from: EntityId,
    },
    /// The whole collection of a kind was replaced.
    Reload,
}

/// A change recorded by the store before it is sequenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Kind of the affected entity.
    pub kind: EntityKind,
    /// Affected entity; `None` for a collection reload.
    pub id: Option<EntityId>,
    /// What happened.
    pub change_type: ChangeType,
}

impl Change {
    /// Creates a change for a single entity.
    pub fn entity(kind: EntityKind, id: EntityId, change_type: ChangeType) -> Self {
        Self {
            kind,
            id: Some(id),
            change_type,
        }
    }

    /// Creates a collection reload change.
    pub fn reload(kind: EntityKind) -> Self {
        Self {
            kind,
            id: None,
            change_type: ChangeType::Reload,
        }
    }
}

/// A single sequenced change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Store sequence number; strictly increasing in commit order.
    pub sequence: u64,
    /// Kind of the affected entity.
    pub kind: EntityKind,
    /// Affected entity; `None` for a collection reload.
    pub id: Option<EntityId>,
    /// What happened.
    pub change_type: ChangeType,
}

impl ChangeEvent {
    /// Attaches a sequence number to a recorded change.
    pub fn sequenced(sequence: u64, change: Change) -> Self {
        Self {
            sequence,
            kind: change.kind,
            id: change.id,
            change_type: change.change_type,
        }
    }

    /// Returns true if this event concerns entity `id` of `kind`.
    ///
    /// Reloads concern every entity of their kind; a rekey concerns both
    /// the old and the new id.
    pub fn touches(&self, kind: EntityKind, id: &EntityId) -> bool {
        if self.kind != kind {
            return false;
        }
        match (&self.id, &self.change_type) {
            (None, _) => true,
            (Some(current), ChangeType::Rekey { from }) => current == id || from == id,
            (Some(current), _) => current == id,
        }
    }
}

/// What a subscriber wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interest {
    /// Every change.
    All,
    /// Changes to any entity of one kind.
    Kind(EntityKind),
    /// Changes to one entity.
    Entity(EntityKind, EntityId),
}

impl Interest {
    /// Returns true if `event` matches this interest.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            Interest::All => true,
            Interest::Kind(kind) => event.kind == *kind,
            Interest::Entity(kind, id) => event.touches(*kind, id),
        }
    }
}

struct Subscriber {
    interest: Interest,
    tx: Sender<ChangeEvent>,
}

/// A change feed that distributes store changes to subscribers.
///
/// The change feed:
/// - Emits only completed writes
/// - Preserves commit order
/// - Filters by subscriber interest
/// - Is thread-safe
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Subscriber>>,
    history: RwLock<Vec<ChangeEvent>>,
    max_history: usize,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self::with_max_history(1024)
    }

    /// Creates a change feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
        }
    }

    /// Subscribes to changes matching `interest`.
    ///
    /// The receiver should be drained regularly; dropping it unsubscribes.
    pub fn subscribe(&self, interest: Interest) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(Subscriber { interest, tx });
        rx
    }

    /// Emits a change event to every interested subscriber.
    pub fn emit(&self, event: ChangeEvent) {
        {
            let mut history = self.history.write();
            history.push(event.clone());
            if history.len() > self.max_history {
                let to_remove = history.len() - self.max_history;
                history.drain(0..to_remove);
            }
        }

        // Disconnected subscribers are dropped, uninterested ones kept.
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|sub| !sub.interest.matches(&event) || sub.tx.send(event.clone()).is_ok());
    }

    /// Emits multiple events from a single write.
    pub fn emit_batch(&self, events: Vec<ChangeEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Polls events with sequence > cursor, up to limit.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        let history = self.history.read();
        history
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number in history.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last().map(|e| e.sequence).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns the number of events in history.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.subscriber_count())
            .field("history", &self.history_len())
            .finish_non_exhaustive()
    }
}
