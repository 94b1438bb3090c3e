//! Slugs freed by writes that have not settled.
//!
//! An update that changes a slug, or a delete, frees the old slug in the
//! store before the backend has answered. The slug stays reserved for the
//! entity that held it until the write settles, so a rollback can always
//! put it back.

use crate::error::{DataError, DataResult};
use nightlife_core::{EntityId, EntityKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type Key = (EntityKind, String);

#[derive(Debug, Default)]
pub(crate) struct SlugReservations {
    held: Mutex<HashMap<Key, EntityId>>,
}

impl SlugReservations {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails with a conflict if another entity's pending write holds `slug`.
    pub(crate) fn check(&self, kind: EntityKind, slug: &str, id: &EntityId) -> DataResult<()> {
        match self.held.lock().get(&(kind, slug.to_owned())) {
            Some(holder) if holder != id => Err(DataError::conflict(
                kind,
                format!("slug {slug} is held by a pending write to {holder}"),
            )),
            _ => Ok(()),
        }
    }

    /// Holds `slug` for `id` until the returned guard is dropped.
    pub(crate) fn reserve(
        self: &Arc<Self>,
        kind: EntityKind,
        slug: &str,
        id: &EntityId,
    ) -> Reservation {
        let key = (kind, slug.to_owned());
        self.held.lock().insert(key.clone(), id.clone());
        Reservation {
            table: Arc::clone(self),
            key,
            id: id.clone(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.held.lock().len()
    }
}

/// A held slug; released on drop.
#[derive(Debug)]
pub(crate) struct Reservation {
    table: Arc<SlugReservations>,
    key: Key,
    id: EntityId,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut held = self.table.held.lock();
        if held.get(&self.key) == Some(&self.id) {
            held.remove(&self.key);
        }
    }
}
