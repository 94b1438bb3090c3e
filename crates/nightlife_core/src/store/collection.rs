//! Indexed collection of one entity type.

use crate::entity::{Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::types::EntityKind;
use std::collections::HashMap;

/// An entity removed from a collection, with the position it occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct Removed<T> {
    /// Index the entity had in the ordered list.
    pub position: usize,
    /// The entity as it was.
    pub entity: T,
}

/// A record dropped while rebuilding a collection from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Id of the dropped record.
    pub id: EntityId,
    /// Why it was dropped.
    pub reason: String,
}

/// Ordered entities of one type plus their id and slug indices.
///
/// Both indices are rebuilt or patched by every mutating method before it
/// returns, so a slug never points at a removed id.
#[derive(Debug, Clone)]
pub struct Collection<T: Entity> {
    items: Vec<T>,
    by_id: HashMap<EntityId, usize>,
    by_slug: HashMap<String, EntityId>,
}

impl<T: Entity> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            by_id: HashMap::new(),
            by_slug: HashMap::new(),
        }
    }
}

impl<T: Entity> Collection<T> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from untrusted records.
    ///
    /// The first record wins on a duplicate id or slug; later ones are
    /// returned as skipped.
    pub fn from_records(records: impl IntoIterator<Item = T>) -> (Self, Vec<Skipped>) {
        let mut collection = Self::new();
        let mut skipped = Vec::new();
        for record in records {
            let id = record.id().clone();
            if let Err(err) = collection.insert(record) {
                skipped.push(Skipped {
                    id,
                    reason: err.to_string(),
                });
            }
        }
        (collection, skipped)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up an entity by id.
    pub fn get(&self, id: &str) -> Option<&T> {
        self.by_id.get(id).map(|&pos| &self.items[pos])
    }

    /// Looks up an entity by slug.
    pub fn get_by_slug(&self, slug: &str) -> Option<&T> {
        self.by_slug.get(slug).and_then(|id| self.get(id))
    }

    /// Returns true if an entity with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Returns the id owning `slug`, if any.
    pub fn slug_owner(&self, slug: &str) -> Option<&EntityId> {
        self.by_slug.get(slug)
    }

    /// All entities in stable order.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterates over all entities in stable order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Appends a new entity.
    pub fn insert(&mut self, entity: T) -> CoreResult<()> {
        let position = self.items.len();
        self.insert_at(position, entity)
    }

    /// Inserts an entity at `position` (clamped to the end).
    pub fn insert_at(&mut self, position: usize, entity: T) -> CoreResult<()> {
        if self.by_id.contains_key(entity.id().as_str()) {
            return Err(CoreError::conflict(
                T::KIND,
                format!("id '{}' already exists", entity.id()),
            ));
        }
        if self.by_slug.contains_key(entity.slug()) {
            return Err(CoreError::slug_taken(T::KIND, entity.slug()));
        }

        let position = position.min(self.items.len());
        self.by_slug
            .insert(entity.slug().to_string(), entity.id().clone());
        self.items.insert(position, entity);
        self.reindex_from(position);
        Ok(())
    }

    /// Replaces the entity with the same id, returning the previous version.
    pub fn replace(&mut self, entity: T) -> CoreResult<T> {
        let pos = *self
            .by_id
            .get(entity.id().as_str())
            .ok_or_else(|| CoreError::not_found(T::KIND, entity.id().as_str()))?;

        if let Some(owner) = self.by_slug.get(entity.slug()) {
            if owner != entity.id() {
                return Err(CoreError::slug_taken(T::KIND, entity.slug()));
            }
        }

        let previous = std::mem::replace(&mut self.items[pos], entity);
        if previous.slug() != self.items[pos].slug() {
            self.by_slug.remove(previous.slug());
            let current = &self.items[pos];
            self.by_slug
                .insert(current.slug().to_string(), current.id().clone());
        }
        Ok(previous)
    }

    /// Removes an entity, returning it with its former position.
    pub fn remove(&mut self, id: &str) -> Option<Removed<T>> {
        let position = self.by_id.remove(id)?;
        let entity = self.items.remove(position);
        self.by_slug.remove(entity.slug());
        self.reindex_from(position);
        Some(Removed { position, entity })
    }

    /// Changes the id of an entity, keeping its position.
    pub fn rekey(&mut self, from: &str, to: &EntityId) -> CoreResult<()> {
        if self.by_id.contains_key(to.as_str()) {
            return Err(CoreError::conflict(
                T::KIND,
                format!("id '{to}' already exists"),
            ));
        }
        let position = self
            .by_id
            .remove(from)
            .ok_or_else(|| CoreError::not_found(T::KIND, from))?;

        let entity = &mut self.items[position];
        entity.meta_mut().id = to.clone();
        self.by_id.insert(to.clone(), position);
        self.by_slug.insert(entity.slug().to_string(), to.clone());
        Ok(())
    }

    /// Points every reference to `from` at `to` instead.
    ///
    /// Returns the ids of the entities that changed.
    pub fn rewrite_references(
        &mut self,
        kind: EntityKind,
        from: &EntityId,
        to: &EntityId,
    ) -> Vec<EntityId> {
        self.items
            .iter_mut()
            .filter_map(|item| {
                item.rewrite_reference(kind, from, to)
                    .then(|| item.id().clone())
            })
            .collect()
    }

    fn reindex_from(&mut self, start: usize) {
        for (pos, item) in self.items.iter().enumerate().skip(start) {
            self.by_id.insert(item.id().clone(), pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Club, ClubDraft, Draft};
    use crate::types::now;

    fn club(id: &str, slug: &str) -> Club {
        ClubDraft::new(format!("Club {id}"))
            .with_slug(slug)
            .into_entity(EntityId::new(id), now())
    }

    #[test]
    fn insert_and_lookup() {
        let mut clubs = Collection::new();
        clubs.insert(club("c1", "tresor")).unwrap();
        clubs.insert(club("c2", "berghain")).unwrap();

        assert_eq!(clubs.len(), 2);
        assert_eq!(clubs.get("c2").unwrap().slug(), "berghain");
        assert_eq!(clubs.get_by_slug("tresor").unwrap().id().as_str(), "c1");
        assert!(clubs.get("c3").is_none());
    }

    #[test]
    fn duplicate_id_or_slug_conflicts() {
        let mut clubs = Collection::new();
        clubs.insert(club("c1", "tresor")).unwrap();

        let err = clubs.insert(club("c1", "other")).unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
        let err = clubs.insert(club("c2", "tresor")).unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
        assert_eq!(clubs.len(), 1);
    }

    #[test]
    fn replace_moves_slug_index() {
        let mut clubs = Collection::new();
        clubs.insert(club("c1", "tresor")).unwrap();
        clubs.insert(club("c2", "berghain")).unwrap();

        let previous = clubs.replace(club("c1", "tresor-berlin")).unwrap();
        assert_eq!(previous.slug(), "tresor");
        assert!(clubs.get_by_slug("tresor").is_none());
        assert_eq!(clubs.get_by_slug("tresor-berlin").unwrap().id().as_str(), "c1");

        let err = clubs.replace(club("c1", "berghain")).unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
        let err = clubs.replace(club("c9", "nowhere")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn remove_and_restore_position() {
        let mut clubs = Collection::new();
        for (id, slug) in [("c1", "a"), ("c2", "b"), ("c3", "c")] {
            clubs.insert(club(id, slug)).unwrap();
        }

        let removed = clubs.remove("c2").unwrap();
        assert_eq!(removed.position, 1);
        assert!(clubs.get_by_slug("b").is_none());
        assert_eq!(clubs.get("c3").unwrap().slug(), "c");

        clubs.insert_at(removed.position, removed.entity).unwrap();
        let order: Vec<_> = clubs.iter().map(|c| c.id().as_str()).collect();
        assert_eq!(order, ["c1", "c2", "c3"]);
        assert_eq!(clubs.get("c3").unwrap().slug(), "c");
    }

    #[test]
    fn rekey_keeps_position_and_slug() {
        let mut clubs = Collection::new();
        let temp = EntityId::temporary();
        clubs.insert(club("c1", "a")).unwrap();
        clubs.insert(club(temp.as_str(), "b")).unwrap();

        clubs.rekey(&temp, &EntityId::new("c2")).unwrap();
        assert!(clubs.get(&temp).is_none());
        assert_eq!(clubs.get_by_slug("b").unwrap().id().as_str(), "c2");
        assert_eq!(clubs.as_slice()[1].id().as_str(), "c2");

        assert!(clubs.rekey("c2", &EntityId::new("c1")).is_err());
    }

    #[test]
    fn from_records_drops_duplicates() {
        let (clubs, skipped) = Collection::from_records(vec![
            club("c1", "a"),
            club("c2", "a"),
            club("c1", "z"),
            club("c3", "c"),
        ]);
        assert_eq!(clubs.len(), 2);
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].id.as_str(), "c2");
    }
}
