//! Relationship-aware views.
//!
//! The resolver owns no state: every join is computed from the store it
//! borrows, so results always reflect the latest completed write. Missing
//! targets resolve to `None` or an empty list.

use crate::entity::{Club, Dj, Entity, EntityId, Event, Promoter, Reference};
use crate::store::EntityStore;
use crate::types::EntityKind;
use std::collections::HashSet;

/// A reference that points at an entity which is not in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    /// Kind of the referencing entity.
    pub owner_kind: EntityKind,
    /// Id of the referencing entity.
    pub owner_id: EntityId,
    /// The unresolved target.
    pub target: Reference,
}

/// Read-only joins across entity kinds.
#[derive(Debug, Clone, Copy)]
pub struct RelationalResolver<'a> {
    store: &'a EntityStore,
}

impl<'a> RelationalResolver<'a> {
    /// Creates a resolver over `store`.
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    /// The club hosting an event.
    pub fn club_for_event(&self, event_id: &str) -> Option<&'a Club> {
        let event = self.store.get_by_id::<Event>(event_id)?;
        let club_id = event.club_id.as_ref()?;
        self.store.get_by_id::<Club>(club_id)
    }

    /// The DJs booked for an event, in booking order; unknown ids are skipped.
    pub fn djs_for_event(&self, event_id: &str) -> Vec<&'a Dj> {
        self.store
            .get_by_id::<Event>(event_id)
            .map(|event| {
                event
                    .dj_ids
                    .iter()
                    .filter_map(|id| self.store.get_by_id::<Dj>(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The promoter of an event.
    pub fn promoter_for_event(&self, event_id: &str) -> Option<&'a Promoter> {
        let event = self.store.get_by_id::<Event>(event_id)?;
        let promoter_id = event.promoter_id.as_ref()?;
        self.store.get_by_id::<Promoter>(promoter_id)
    }

    /// Events hosted at a club; empty if the club is gone.
    pub fn events_for_club(&self, club_id: &str) -> Vec<&'a Event> {
        if !self.store.contains(EntityKind::Club, club_id) {
            return Vec::new();
        }
        self.events_where(|event| event.club_id.as_deref() == Some(club_id))
    }

    /// Events a DJ is booked for; empty if the DJ is gone.
    pub fn events_for_dj(&self, dj_id: &str) -> Vec<&'a Event> {
        if !self.store.contains(EntityKind::Dj, dj_id) {
            return Vec::new();
        }
        self.events_where(|event| event.dj_ids.iter().any(|id| id.as_str() == dj_id))
    }

    /// Events organized by a promoter; empty if the promoter is gone.
    pub fn events_for_promoter(&self, promoter_id: &str) -> Vec<&'a Event> {
        if !self.store.contains(EntityKind::Promoter, promoter_id) {
            return Vec::new();
        }
        self.events_where(|event| event.promoter_id.as_deref() == Some(promoter_id))
    }

    /// Distinct DJs booked at a club's events, in first-seen order.
    pub fn djs_for_club(&self, club_id: &str) -> Vec<&'a Dj> {
        let mut seen = HashSet::new();
        self.events_for_club(club_id)
            .into_iter()
            .flat_map(|event| event.dj_ids.iter())
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.store.get_by_id::<Dj>(id))
            .collect()
    }

    /// Every reference that currently resolves to absent.
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();
        self.collect_dangling::<Event>(&mut dangling);
        self.collect_dangling::<Dj>(&mut dangling);
        self.collect_dangling::<Club>(&mut dangling);
        self.collect_dangling::<Promoter>(&mut dangling);
        dangling
    }

    fn events_where(&self, predicate: impl Fn(&Event) -> bool) -> Vec<&'a Event> {
        self.store
            .list_all::<Event>()
            .iter()
            .filter(|event| predicate(event))
            .collect()
    }

    fn collect_dangling<T: Entity>(&self, out: &mut Vec<DanglingReference>) {
        for entity in self.store.list_all::<T>() {
            for target in entity.references() {
                if !self.store.resolves(&target) {
                    out.push(DanglingReference {
                        owner_kind: T::KIND,
                        owner_id: entity.id().clone(),
                        target,
                    });
                }
            }
        }
    }
}
