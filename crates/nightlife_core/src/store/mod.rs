//! Entity store.
//!
//! [`EntityStore`] holds one indexed [`Collection`] per entity kind and
//! records a [`Change`] for every mutation. It is plain data; sharing and
//! change publication are handled by [`Store`].

mod collection;
mod shared;

pub use collection::{Collection, Removed, Skipped};
pub use shared::{Store, StoreView};

use crate::change_feed::{Change, ChangeType};
use crate::entity::{Club, Dj, Entity, EntityId, Event, Promoter, Reference};
use crate::error::CoreResult;
use crate::resolver::RelationalResolver;
use crate::snapshot::StoreSnapshot;
use crate::types::{now, EntityKind};

/// Canonical in-memory collections for every entity kind.
#[derive(Debug, Default, Clone)]
pub struct EntityStore {
    pub(crate) events: Collection<Event>,
    pub(crate) djs: Collection<Dj>,
    pub(crate) clubs: Collection<Club>,
    pub(crate) promoters: Collection<Promoter>,
    changes: Vec<Change>,
}

impl EntityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from a persisted snapshot.
    ///
    /// Records violating id or slug uniqueness are dropped and returned.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> (Self, Vec<(EntityKind, Skipped)>) {
        let mut store = Self::new();
        let mut skipped = Vec::new();
        let mut collect = |kind: EntityKind, dropped: Vec<Skipped>| {
            skipped.extend(dropped.into_iter().map(|s| (kind, s)));
        };
        collect(EntityKind::Event, store.replace_all(snapshot.events));
        collect(EntityKind::Dj, store.replace_all(snapshot.djs));
        collect(EntityKind::Club, store.replace_all(snapshot.clubs));
        collect(EntityKind::Promoter, store.replace_all(snapshot.promoters));
        store.changes.clear();
        (store, skipped)
    }

    /// Captures the current contents.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            taken_at: now(),
            events: self.events.as_slice().to_vec(),
            djs: self.djs.as_slice().to_vec(),
            clubs: self.clubs.as_slice().to_vec(),
            promoters: self.promoters.as_slice().to_vec(),
        }
    }

    /// The collection of `T`.
    pub fn collection<T: Entity>(&self) -> &Collection<T> {
        T::collection(self)
    }

    /// Looks up an entity by id.
    pub fn get_by_id<T: Entity>(&self, id: &str) -> Option<&T> {
        T::collection(self).get(id)
    }

    /// Looks up an entity by slug.
    pub fn get_by_slug<T: Entity>(&self, slug: &str) -> Option<&T> {
        T::collection(self).get_by_slug(slug)
    }

    /// All entities of type `T`, in stable order.
    pub fn list_all<T: Entity>(&self) -> &[T] {
        T::collection(self).as_slice()
    }

    /// Returns true if an entity of `kind` with `id` exists.
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Event => self.events.contains(id),
            EntityKind::Dj => self.djs.contains(id),
            EntityKind::Club => self.clubs.contains(id),
            EntityKind::Promoter => self.promoters.contains(id),
        }
    }

    /// Returns true if `reference` resolves to an existing entity.
    pub fn resolves(&self, reference: &Reference) -> bool {
        self.contains(reference.kind, &reference.id)
    }

    /// Number of entities of `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Event => self.events.len(),
            EntityKind::Dj => self.djs.len(),
            EntityKind::Club => self.clubs.len(),
            EntityKind::Promoter => self.promoters.len(),
        }
    }

    /// Total number of entities.
    pub fn total_count(&self) -> usize {
        EntityKind::ALL.into_iter().map(|k| self.count(k)).sum()
    }

    /// Relationship-aware views over the current contents.
    pub fn resolver(&self) -> RelationalResolver<'_> {
        RelationalResolver::new(self)
    }

    /// Inserts a new entity.
    pub fn insert<T: Entity>(&mut self, entity: T) -> CoreResult<()> {
        let id = entity.id().clone();
        T::collection_mut(self).insert(entity)?;
        self.record(Change::entity(T::KIND, id, ChangeType::Insert));
        Ok(())
    }

    /// Replaces an existing entity, returning the previous version.
    pub fn replace<T: Entity>(&mut self, entity: T) -> CoreResult<T> {
        let id = entity.id().clone();
        let previous = T::collection_mut(self).replace(entity)?;
        self.record(Change::entity(T::KIND, id, ChangeType::Update));
        Ok(previous)
    }

    /// Removes an entity from the collection and both indices.
    ///
    /// References held by other entities are left in place; they resolve
    /// to absent from now on.
    pub fn remove<T: Entity>(&mut self, id: &str) -> Option<Removed<T>> {
        let removed = T::collection_mut(self).remove(id)?;
        self.record(Change::entity(
            T::KIND,
            removed.entity.id().clone(),
            ChangeType::Delete,
        ));
        Some(removed)
    }

    /// Puts a removed entity back at its former position.
    pub fn restore<T: Entity>(&mut self, removed: Removed<T>) -> CoreResult<()> {
        let id = removed.entity.id().clone();
        T::collection_mut(self).insert_at(removed.position, removed.entity)?;
        self.record(Change::entity(T::KIND, id, ChangeType::Insert));
        Ok(())
    }

    /// Swaps the id of an entity and rewrites every reference to it.
    pub fn rekey<T: Entity>(&mut self, from: &EntityId, to: &EntityId) -> CoreResult<()> {
        T::collection_mut(self).rekey(from, to)?;
        self.record(Change::entity(
            T::KIND,
            to.clone(),
            ChangeType::Rekey { from: from.clone() },
        ));

        let kind = T::KIND;
        let touched = [
            (EntityKind::Event, self.events.rewrite_references(kind, from, to)),
            (EntityKind::Dj, self.djs.rewrite_references(kind, from, to)),
            (EntityKind::Club, self.clubs.rewrite_references(kind, from, to)),
            (
                EntityKind::Promoter,
                self.promoters.rewrite_references(kind, from, to),
            ),
        ];
        for (owner, ids) in touched {
            for id in ids {
                self.record(Change::entity(owner, id, ChangeType::Update));
            }
        }
        Ok(())
    }

    /// Replaces the whole collection of `T`.
    ///
    /// Returns the records dropped for violating id or slug uniqueness.
    pub fn replace_all<T: Entity>(&mut self, records: Vec<T>) -> Vec<Skipped> {
        let (collection, skipped) = Collection::from_records(records);
        for dropped in &skipped {
            tracing::warn!(
                kind = %T::KIND,
                id = %dropped.id,
                reason = %dropped.reason,
                "dropping record"
            );
        }
        *T::collection_mut(self) = collection;
        self.record(Change::reload(T::KIND));
        skipped
    }

    pub(crate) fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    fn record(&mut self, change: Change) {
        self.changes.push(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ClubDraft, Draft, DjDraft, EventDraft};
    use crate::types::Status;

    fn seeded() -> EntityStore {
        let mut store = EntityStore::new();
        let at = now();
        store
            .insert(ClubDraft::new("Tresor").into_entity("c1".into(), at))
            .unwrap();
        store
            .insert(DjDraft::new("Surgeon").into_entity("d1".into(), at))
            .unwrap();
        store
            .insert(
                EventDraft::new("Tresor Night")
                    .at_club("c1")
                    .with_dj("d1")
                    .into_entity("e1".into(), at),
            )
            .unwrap();
        store.take_changes();
        store
    }

    #[test]
    fn typed_lookups() {
        let store = seeded();
        assert_eq!(store.get_by_id::<Club>("c1").unwrap().name, "Tresor");
        assert_eq!(store.get_by_slug::<Dj>("surgeon").unwrap().id().as_str(), "d1");
        assert!(store.get_by_id::<Club>("d1").is_none());
        assert_eq!(store.list_all::<Event>().len(), 1);
        assert_eq!(store.total_count(), 3);
    }

    #[test]
    fn remove_purges_indices_and_leaves_references() {
        let mut store = seeded();
        let removed = store.remove::<Club>("c1").unwrap();
        assert_eq!(removed.entity.status(), Status::Pending);

        assert!(store.get_by_id::<Club>("c1").is_none());
        assert!(store.get_by_slug::<Club>("tresor").is_none());
        let event = store.get_by_id::<Event>("e1").unwrap();
        assert_eq!(event.club_id.as_deref(), Some("c1"));
        assert!(!store.contains(EntityKind::Club, "c1"));

        let changes = store.take_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Delete);
    }

    #[test]
    fn rekey_rewrites_references() {
        let mut store = seeded();
        let temp = EntityId::temporary();
        store
            .insert(DjDraft::new("Blawan").into_entity(temp.clone(), now()))
            .unwrap();
        let mut event = store.get_by_id::<Event>("e1").unwrap().clone();
        event.dj_ids.push(temp.clone());
        store.replace(event).unwrap();
        store.take_changes();

        store.rekey::<Dj>(&temp, &EntityId::new("d2")).unwrap();

        let event = store.get_by_id::<Event>("e1").unwrap();
        assert_eq!(event.dj_ids, vec![EntityId::new("d1"), EntityId::new("d2")]);
        let changes = store.take_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].id.as_deref(), Some("e1"));
    }

    #[test]
    fn snapshot_round_trip_keeps_order() {
        let store = seeded();
        let (restored, skipped) = EntityStore::from_snapshot(store.snapshot());
        assert!(skipped.is_empty());
        assert_eq!(restored.list_all::<Event>(), store.list_all::<Event>());
        assert_eq!(restored.total_count(), 3);
    }
}
