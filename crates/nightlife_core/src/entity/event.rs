//! Events.

use super::{patch_field, require_text, resolve_slug, Draft, Entity, EntityId, EntityMeta, Patch, Reference};
use crate::error::{CoreError, CoreResult};
use crate::store::{Collection, EntityStore};
use crate::types::{EntityKind, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A dated nightlife event, optionally tied to a club, a promoter and DJs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Store-managed attributes.
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Event title.
    pub title: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<Timestamp>,
    /// End time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<Timestamp>,
    /// Hosting club.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_id: Option<EntityId>,
    /// Booked DJs.
    #[serde(default)]
    pub dj_ids: Vec<EntityId>,
    /// Organizing promoter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoter_id: Option<EntityId>,
    /// Flyer image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Ticket shop link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_url: Option<String>,
    /// Music genres.
    #[serde(default)]
    pub genres: Vec<String>,
}

impl Entity for Event {
    const KIND: EntityKind = EntityKind::Event;
    type Draft = EventDraft;
    type Patch = EventPatch;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn display_name(&self) -> &str {
        &self.title
    }

    fn validate_fields(&self) -> CoreResult<()> {
        require_text("event title", &self.title)?;
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end < start {
                return Err(CoreError::validation("event ends before it starts"));
            }
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.dj_ids.iter().find(|id| !seen.insert(*id)) {
            return Err(CoreError::validation(format!("dj {dup} is listed twice")));
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::with_capacity(self.dj_ids.len() + 2);
        if let Some(club) = &self.club_id {
            refs.push(Reference::new(EntityKind::Club, club.clone()));
        }
        refs.extend(
            self.dj_ids
                .iter()
                .map(|dj| Reference::new(EntityKind::Dj, dj.clone())),
        );
        if let Some(promoter) = &self.promoter_id {
            refs.push(Reference::new(EntityKind::Promoter, promoter.clone()));
        }
        refs
    }

    fn rewrite_reference(&mut self, kind: EntityKind, from: &EntityId, to: &EntityId) -> bool {
        let slot = match kind {
            EntityKind::Club => self.club_id.as_mut(),
            EntityKind::Promoter => self.promoter_id.as_mut(),
            EntityKind::Dj => self.dj_ids.iter_mut().find(|id| *id == from),
            EntityKind::Event => None,
        };
        match slot {
            Some(id) if id == from => {
                *id = to.clone();
                true
            }
            _ => false,
        }
    }

    fn collection(store: &EntityStore) -> &Collection<Self> {
        &store.events
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self> {
        &mut store.events
    }
}

/// Creation input for an [`Event`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EventDraft {
    /// Explicit slug; derived from the title when absent.
    #[serde(default)]
    pub slug: Option<String>,
    /// Event title.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Start time.
    #[serde(default)]
    pub starts_at: Option<Timestamp>,
    /// End time.
    #[serde(default)]
    pub ends_at: Option<Timestamp>,
    /// Hosting club.
    #[serde(default)]
    pub club_id: Option<EntityId>,
    /// Booked DJs.
    #[serde(default)]
    pub dj_ids: Vec<EntityId>,
    /// Organizing promoter.
    #[serde(default)]
    pub promoter_id: Option<EntityId>,
    /// Flyer image.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Ticket shop link.
    #[serde(default)]
    pub ticket_url: Option<String>,
    /// Music genres.
    #[serde(default)]
    pub genres: Vec<String>,
}

impl EventDraft {
    /// Starts a draft with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets an explicit slug.
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Sets the hosting club.
    pub fn at_club(mut self, club_id: impl Into<EntityId>) -> Self {
        self.club_id = Some(club_id.into());
        self
    }

    /// Adds a booked DJ.
    pub fn with_dj(mut self, dj_id: impl Into<EntityId>) -> Self {
        self.dj_ids.push(dj_id.into());
        self
    }

    /// Sets the promoter.
    pub fn by_promoter(mut self, promoter_id: impl Into<EntityId>) -> Self {
        self.promoter_id = Some(promoter_id.into());
        self
    }
}

impl Draft for EventDraft {
    type Entity = Event;

    fn into_entity(self, id: EntityId, at: Timestamp) -> Event {
        let slug = resolve_slug(self.slug, &self.title);
        Event {
            meta: EntityMeta::pending(id, slug, at),
            title: self.title.trim().to_string(),
            description: self.description,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            club_id: self.club_id,
            dj_ids: self.dj_ids,
            promoter_id: self.promoter_id,
            image_url: self.image_url,
            ticket_url: self.ticket_url,
            genres: self.genres,
        }
    }
}

/// Partial update for an [`Event`].
///
/// `Some(None)` on a nullable field clears it.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    /// New slug.
    pub slug: Option<String>,
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<Option<String>>,
    /// New start time.
    pub starts_at: Option<Option<Timestamp>>,
    /// New end time.
    pub ends_at: Option<Option<Timestamp>>,
    /// New hosting club.
    pub club_id: Option<Option<EntityId>>,
    /// Replacement DJ list.
    pub dj_ids: Option<Vec<EntityId>>,
    /// New promoter.
    pub promoter_id: Option<Option<EntityId>>,
    /// New flyer image.
    pub image_url: Option<Option<String>>,
    /// New ticket link.
    pub ticket_url: Option<Option<String>>,
    /// Replacement genre list.
    pub genres: Option<Vec<String>>,
}

impl Patch for EventPatch {
    type Entity = Event;

    fn apply_to(&self, event: &mut Event) {
        patch_field(&mut event.meta.slug, &self.slug);
        patch_field(&mut event.title, &self.title);
        patch_field(&mut event.description, &self.description);
        patch_field(&mut event.starts_at, &self.starts_at);
        patch_field(&mut event.ends_at, &self.ends_at);
        patch_field(&mut event.club_id, &self.club_id);
        patch_field(&mut event.dj_ids, &self.dj_ids);
        patch_field(&mut event.promoter_id, &self.promoter_id);
        patch_field(&mut event.image_url, &self.image_url);
        patch_field(&mut event.ticket_url, &self.ticket_url);
        patch_field(&mut event.genres, &self.genres);
    }

    fn is_empty(&self) -> bool {
        self.slug.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.starts_at.is_none()
            && self.ends_at.is_none()
            && self.club_id.is_none()
            && self.dj_ids.is_none()
            && self.promoter_id.is_none()
            && self.image_url.is_none()
            && self.ticket_url.is_none()
            && self.genres.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{now, Status};
    use chrono::Duration;

    #[test]
    fn draft_derives_slug_and_starts_pending() {
        let event = EventDraft::new("Klubnacht: Opening")
            .at_club("c1")
            .into_entity(EntityId::new("e1"), now());

        assert_eq!(event.slug(), "klubnacht-opening");
        assert_eq!(event.status(), Status::Pending);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_times_and_duplicate_djs() {
        let start = now();
        let mut event = EventDraft::new("Late").into_entity(EntityId::new("e1"), start);
        event.starts_at = Some(start);
        event.ends_at = Some(start - Duration::hours(1));
        assert!(event.validate().is_err());

        event.ends_at = None;
        event.dj_ids = vec![EntityId::new("d1"), EntityId::new("d1")];
        assert!(event.validate().is_err());
    }

    #[test]
    fn references_and_rewrite() {
        let mut event = EventDraft::new("Rave")
            .at_club("c1")
            .with_dj("d1")
            .with_dj("d2")
            .by_promoter("p1")
            .into_entity(EntityId::new("e1"), now());

        assert_eq!(event.references().len(), 4);

        assert!(event.rewrite_reference(EntityKind::Dj, &"d2".into(), &"d9".into()));
        assert_eq!(event.dj_ids, vec![EntityId::new("d1"), EntityId::new("d9")]);
        assert!(!event.rewrite_reference(EntityKind::Club, &"c7".into(), &"c8".into()));
    }

    #[test]
    fn patch_clears_reference() {
        let mut event = EventDraft::new("Rave")
            .at_club("c1")
            .into_entity(EntityId::new("e1"), now());
        let patch = EventPatch {
            club_id: Some(None),
            title: Some("Rave II".into()),
            ..EventPatch::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut event);
        assert_eq!(event.club_id, None);
        assert_eq!(event.title, "Rave II");
    }

    #[test]
    fn draft_rejects_unknown_fields() {
        let json = r#"{"title": "Rave", "colour": "pink"}"#;
        assert!(serde_json::from_str::<EventDraft>(json).is_err());
    }

    #[test]
    fn decodes_backend_document() {
        let doc = serde_json::json!({
            "id": 17,
            "slug": "warehouse",
            "status": "approved",
            "title": "Warehouse",
            "clubId": "c1",
            "djIds": ["d1", 2]
        });
        let event = Event::from_document(doc).unwrap();
        assert_eq!(event.id().as_str(), "17");
        assert_eq!(event.status(), Status::Approved);
        assert_eq!(event.dj_ids[1].as_str(), "2");
    }
}
