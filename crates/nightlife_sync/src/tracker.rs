//! Ordering between fetches and local writes.
//!
//! Fetch generations and write completions are stamped from one clock. A
//! fetched collection may only replace the store's copy if no write of that
//! kind is in flight and none completed after the fetch was started.

use nightlife_core::EntityKind;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy)]
struct KindWrites {
    in_flight: usize,
    last_completed: u64,
}

#[derive(Debug, Default)]
struct Clock {
    now: u64,
    kinds: HashMap<EntityKind, KindWrites>,
}

/// Shared clock for fetch generations and local write completions.
#[derive(Debug, Default)]
pub struct WriteTracker {
    clock: Mutex<Clock>,
}

impl WriteTracker {
    /// Creates a tracker at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock and returns the new value.
    pub fn tick(&self) -> u64 {
        let mut clock = self.clock.lock();
        clock.now += 1;
        clock.now
    }

    /// Marks a write of `kind` as in flight until the guard is dropped.
    pub fn begin(self: &Arc<Self>, kind: EntityKind) -> WriteGuard {
        self.clock.lock().kinds.entry(kind).or_default().in_flight += 1;
        WriteGuard {
            tracker: Arc::clone(self),
            kind,
        }
    }

    /// Whether a fetch of `kind` started at `generation` may still be applied.
    pub fn is_clean_since(&self, kind: EntityKind, generation: u64) -> bool {
        let clock = self.clock.lock();
        clock
            .kinds
            .get(&kind)
            .map_or(true, |w| w.in_flight == 0 && w.last_completed < generation)
    }

    /// Writes of `kind` currently in flight.
    pub fn in_flight(&self, kind: EntityKind) -> usize {
        self.clock
            .lock()
            .kinds
            .get(&kind)
            .map_or(0, |w| w.in_flight)
    }

    fn finish(&self, kind: EntityKind) {
        let mut clock = self.clock.lock();
        clock.now += 1;
        let stamp = clock.now;
        let writes = clock.kinds.entry(kind).or_default();
        writes.in_flight = writes.in_flight.saturating_sub(1);
        writes.last_completed = stamp;
    }
}

/// Keeps a write registered with its [`WriteTracker`].
#[derive(Debug)]
pub struct WriteGuard {
    tracker: Arc<WriteTracker>,
    kind: EntityKind,
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.tracker.finish(self.kind);
    }
}
