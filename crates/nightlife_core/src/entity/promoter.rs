//! Promoters.

use super::{patch_field, require_text, resolve_slug, Draft, Entity, EntityId, EntityMeta, Patch};
use crate::error::CoreResult;
use crate::store::{Collection, EntityStore};
use crate::types::{EntityKind, Timestamp};
use serde::{Deserialize, Serialize};

/// An event promoter or collective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promoter {
    /// Store-managed attributes.
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Promoter name.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Website.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Logo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Entity for Promoter {
    const KIND: EntityKind = EntityKind::Promoter;
    type Draft = PromoterDraft;
    type Patch = PromoterPatch;

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
        require_text("promoter name", &self.name)
    }

    fn collection(store: &EntityStore) -> &Collection<Self> {
        &store.promoters
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self> {
        &mut store.promoters
    }
}

/// Creation input for a [`Promoter`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PromoterDraft {
    /// Explicit slug; derived from the name when absent.
    #[serde(default)]
    pub slug: Option<String>,
    /// Promoter name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Website.
    #[serde(default)]
    pub website: Option<String>,
    /// Logo.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl PromoterDraft {
    /// Starts a draft with the given name.
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
}

impl Draft for PromoterDraft {
    type Entity = Promoter;

    fn into_entity(self, id: EntityId, at: Timestamp) -> Promoter {
        let slug = resolve_slug(self.slug, &self.name);
        Promoter {
            meta: EntityMeta::pending(id, slug, at),
            name: self.name.trim().to_string(),
            description: self.description,
            website: self.website,
            image_url: self.image_url,
        }
    }
}

/// Partial update for a [`Promoter`].
#[derive(Debug, Clone, Default)]
pub struct PromoterPatch {
    /// New slug.
    pub slug: Option<String>,
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<Option<String>>,
    /// New website.
    pub website: Option<Option<String>>,
    /// New logo.
    pub image_url: Option<Option<String>>,
}

impl Patch for PromoterPatch {
    type Entity = Promoter;

    fn apply_to(&self, promoter: &mut Promoter) {
        patch_field(&mut promoter.meta.slug, &self.slug);
        patch_field(&mut promoter.name, &self.name);
        patch_field(&mut promoter.description, &self.description);
        patch_field(&mut promoter.website, &self.website);
        patch_field(&mut promoter.image_url, &self.image_url);
    }

    fn is_empty(&self) -> bool {
        self.slug.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.website.is_none()
            && self.image_url.is_none()
    }
}
