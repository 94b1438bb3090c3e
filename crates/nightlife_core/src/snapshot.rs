//! Point-in-time copies of the store for persistence.

use crate::entity::{Club, Dj, Entity, Event, Promoter};
use crate::types::{EntityKind, Timestamp};
use serde::{Deserialize, Serialize};

/// Every collection of the store at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// When the snapshot was taken.
    pub taken_at: Timestamp,
    /// Events.
    #[serde(default)]
    pub events: Vec<Event>,
    /// DJs.
    #[serde(default)]
    pub djs: Vec<Dj>,
    /// Clubs.
    #[serde(default)]
    pub clubs: Vec<Club>,
    /// Promoters.
    #[serde(default)]
    pub promoters: Vec<Promoter>,
}

impl StoreSnapshot {
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
        EntityKind::ALL.into_iter().map(|kind| self.count(kind)).sum()
    }

    /// Drops records still carrying a locally assigned temporary id.
    ///
    /// Those were never confirmed by the backend and must not outlive the
    /// process that created them.
    pub fn without_temporary(mut self) -> Self {
        fn confirmed<T: Entity>(records: &mut Vec<T>) {
            records.retain(|record| !record.id().is_temporary());
        }
        confirmed(&mut self.events);
        confirmed(&mut self.djs);
        confirmed(&mut self.clubs);
        confirmed(&mut self.promoters);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ClubDraft, Draft, EntityId};
    use crate::store::EntityStore;
    use crate::types::now;

    #[test]
    fn temporary_records_are_left_out() {
        let mut store = EntityStore::new();
        store
            .insert(ClubDraft::new("Tresor").into_entity("c1".into(), now()))
            .unwrap();
        store
            .insert(ClubDraft::new("Ghost").into_entity(EntityId::temporary(), now()))
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.count(EntityKind::Club), 2);

        let confirmed = snapshot.without_temporary();
        assert_eq!(confirmed.total(), 1);
        assert_eq!(confirmed.clubs[0].id().as_str(), "c1");
    }
}
