//! Clubs.

use super::{patch_field, require_text, resolve_slug, Draft, Entity, EntityId, EntityMeta, Patch};
use crate::error::{CoreError, CoreResult};
use crate::store::{Collection, EntityStore};
use crate::types::{EntityKind, Timestamp};
use serde::{Deserialize, Serialize};

/// A club or venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    /// Store-managed attributes.
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Venue name.
    pub name: String,
    /// Street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// City.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Maximum capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    /// Venue photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity for Club {
    const KIND: EntityKind = EntityKind::Club;
    type Draft = ClubDraft;
    type Patch = ClubPatch;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn validate_fields(&self) -> CoreResult<()> {
        require_text("club name", &self.name)?;
        if self.capacity == Some(0) {
            return Err(CoreError::validation("club capacity must be positive"));
        }
        Ok(())
    }

    fn collection(store: &EntityStore) -> &Collection<Self> {
        &store.clubs
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self> {
        &mut store.clubs
    }
}

/// Creation input for a [`Club`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClubDraft {
    /// Explicit slug; derived from the name when absent.
    #[serde(default)]
    pub slug: Option<String>,
    /// Venue name.
    pub name: String,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// City.
    #[serde(default)]
    pub city: Option<String>,
    /// Maximum capacity.
    #[serde(default)]
    pub capacity: Option<u32>,
    /// Venue photo.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl ClubDraft {
    /// Starts a draft with the given venue name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets an explicit slug.
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Sets the city.
    pub fn in_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }
}

impl Draft for ClubDraft {
    type Entity = Club;

    fn into_entity(self, id: EntityId, at: Timestamp) -> Club {
        let slug = resolve_slug(self.slug, &self.name);
        Club {
            meta: EntityMeta::pending(id, slug, at),
            name: self.name.trim().to_string(),
            address: self.address,
            city: self.city,
            capacity: self.capacity,
            image_url: self.image_url,
            description: self.description,
        }
    }
}

/// Partial update for a [`Club`].
#[derive(Debug, Clone, Default)]
pub struct ClubPatch {
    /// New slug.
    pub slug: Option<String>,
    /// New venue name.
    pub name: Option<String>,
    /// New address.
    pub address: Option<Option<String>>,
    /// New city.
    pub city: Option<Option<String>>,
    /// New capacity.
    pub capacity: Option<Option<u32>>,
    /// New photo.
    pub image_url: Option<Option<String>>,
    /// New description.
    pub description: Option<Option<String>>,
}

impl Patch for ClubPatch {
    type Entity = Club;

    fn apply_to(&self, club: &mut Club) {
        patch_field(&mut club.meta.slug, &self.slug);
        patch_field(&mut club.name, &self.name);
        patch_field(&mut club.address, &self.address);
        patch_field(&mut club.city, &self.city);
        patch_field(&mut club.capacity, &self.capacity);
        patch_field(&mut club.image_url, &self.image_url);
        patch_field(&mut club.description, &self.description);
    }

    fn is_empty(&self) -> bool {
        self.slug.is_none()
            && self.name.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.capacity.is_none()
            && self.image_url.is_none()
            && self.description.is_none()
    }
}
