//! Sample data and temporary locations.
//!
//! The sample catalogue is small but covers every relation: an event with
//! several DJs, a club hosting two events, a pending record and a promoter.

use chrono::{Duration, TimeZone, Utc};
use nightlife_core::{
    Club, ClubDraft, Dj, DjDraft, Draft, Entity, EntityId, EntityKind, EntityStore, Event,
    EventDraft, Promoter, PromoterDraft, Status, Timestamp,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fixed reference time for fixtures, so snapshots compare equal across runs.
pub fn fixture_time() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 6, 14, 22, 0, 0)
        .single()
        .expect("valid fixture time")
}

/// Builds an entity from a draft with a fixed id and status.
pub fn entity<D: Draft>(id: &str, draft: D, status: Status) -> D::Entity {
    let mut entity = draft.into_entity(EntityId::new(id), fixture_time());
    entity.meta_mut().status = status;
    entity
}

/// Builds an approved entity from a draft.
pub fn approved<D: Draft>(id: &str, draft: D) -> D::Entity {
    entity(id, draft, Status::Approved)
}

/// Builds a pending entity from a draft.
pub fn pending<D: Draft>(id: &str, draft: D) -> D::Entity {
    entity(id, draft, Status::Pending)
}

/// One list per entity kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalogue {
    /// Events.
    pub events: Vec<Event>,
    /// DJs.
    pub djs: Vec<Dj>,
    /// Clubs.
    pub clubs: Vec<Club>,
    /// Promoters.
    pub promoters: Vec<Promoter>,
}

impl Catalogue {
    /// An empty catalogue.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The sample catalogue.
    ///
    /// | id | record | notes |
    /// |----|--------|-------|
    /// | c1 | Tresor | hosts e1 and e2 |
    /// | c2 | About Blank | hosts e3 |
    /// | d1 | Surgeon | plays e1 and e3 |
    /// | d2 | Paula Temple | plays e1 and e2 |
    /// | d3 | Newcomer | pending, no events |
    /// | p1 | Ostgut Ton | promotes e1 |
    /// | e2 | Closing | pending |
    pub fn sample() -> Self {
        let start = fixture_time();

        let mut opening = EventDraft::new("Opening Night")
            .at_club("c1")
            .with_dj("d1")
            .with_dj("d2")
            .by_promoter("p1");
        opening.starts_at = Some(start);
        opening.ends_at = Some(start + Duration::hours(10));
        opening.genres = vec!["techno".into()];

        let mut closing = EventDraft::new("Closing").at_club("c1").with_dj("d2");
        closing.starts_at = Some(start + Duration::days(7));

        let mut garden = EventDraft::new("Garden Rave").at_club("c2").with_dj("d1");
        garden.starts_at = Some(start + Duration::days(1));
        garden.genres = vec!["house".into(), "electro".into()];

        Self {
            clubs: vec![
                approved("c1", ClubDraft::new("Tresor").in_city("Berlin")),
                approved("c2", ClubDraft::new("About Blank").in_city("Berlin")),
            ],
            djs: vec![
                approved("d1", DjDraft::new("Surgeon")),
                approved("d2", DjDraft::new("Paula Temple")),
                pending("d3", DjDraft::new("Newcomer")),
            ],
            promoters: vec![approved("p1", PromoterDraft::new("Ostgut Ton"))],
            events: vec![
                approved("e1", opening),
                pending("e2", closing),
                approved("e3", garden),
            ],
        }
    }

    /// Number of records of `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Event => self.events.len(),
            EntityKind::Dj => self.djs.len(),
            EntityKind::Club => self.clubs.len(),
            EntityKind::Promoter => self.promoters.len(),
        }
    }

    /// Total number of records.
    pub fn total(&self) -> usize {
        EntityKind::ALL.iter().map(|kind| self.count(*kind)).sum()
    }

    /// Loads the catalogue into a fresh store.
    pub fn into_store(self) -> EntityStore {
        let mut store = EntityStore::new();
        insert_all(&mut store, self.clubs);
        insert_all(&mut store, self.djs);
        insert_all(&mut store, self.promoters);
        insert_all(&mut store, self.events);
        store
    }
}

fn insert_all<T: Entity>(store: &mut EntityStore, records: Vec<T>) {
    for record in records {
        store.insert(record).expect("fixture records are unique");
    }
}

/// A snapshot file location inside a temporary directory.
///
/// The directory is removed on drop.
pub struct TempSnapshot {
    dir: TempDir,
    path: PathBuf,
}

impl TempSnapshot {
    /// Creates a fresh directory; the snapshot file itself does not exist yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("cache").join("catalogue.cbor");
        Self { dir, path }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The enclosing temporary directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TempSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_loads_into_store() {
        let catalogue = Catalogue::sample();
        let total = catalogue.total();
        let store = catalogue.into_store();

        assert_eq!(store.total_count(), total);
        assert_eq!(store.get_by_slug::<Club>("about-blank").unwrap().id().as_str(), "c2");
        assert!(store.resolver().dangling_references().is_empty());
    }

    #[test]
    fn sample_relations() {
        let store = Catalogue::sample().into_store();
        let resolver = store.resolver();

        assert_eq!(resolver.events_for_club("c1").len(), 2);
        assert_eq!(resolver.djs_for_event("e1").len(), 2);
        assert!(resolver.events_for_dj("d3").is_empty());
        assert_eq!(store.get_by_id::<Event>("e2").unwrap().status(), Status::Pending);
    }

    #[test]
    fn temp_snapshot_path_is_absent() {
        let temp = TempSnapshot::new();
        assert!(!temp.path().exists());
        assert!(temp.path().starts_with(temp.dir()));
    }
}
