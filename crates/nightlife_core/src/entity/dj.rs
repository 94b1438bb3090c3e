//! DJ profiles.

use super::{patch_field, require_text, resolve_slug, Draft, Entity, EntityId, EntityMeta, Patch};
use crate::error::CoreResult;
use crate::store::{Collection, EntityStore};
use crate::types::{EntityKind, Timestamp};
use serde::{Deserialize, Serialize};

/// A DJ profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dj {
    /// Store-managed attributes.
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Artist name.
    pub name: String,
    /// Biography.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Music genres.
    #[serde(default)]
    pub genres: Vec<String>,
    /// Press photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Social / streaming links.
    #[serde(default)]
    pub links: Vec<String>,
}

impl Entity for Dj {
    const KIND: EntityKind = EntityKind::Dj;
    type Draft = DjDraft;
    type Patch = DjPatch;

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
        require_text("dj name", &self.name)
    }

    fn collection(store: &EntityStore) -> &Collection<Self> {
        &store.djs
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self> {
        &mut store.djs
    }
}

/// Creation input for a [`Dj`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DjDraft {
    /// Explicit slug; derived from the name when absent.
    #[serde(default)]
    pub slug: Option<String>,
    /// Artist name.
    pub name: String,
    /// Biography.
    #[serde(default)]
    pub bio: Option<String>,
    /// Music genres.
    #[serde(default)]
    pub genres: Vec<String>,
    /// Press photo.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Social / streaming links.
    #[serde(default)]
    pub links: Vec<String>,
}

impl DjDraft {
    /// Starts a draft with the given artist name.
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

impl Draft for DjDraft {
    type Entity = Dj;

    fn into_entity(self, id: EntityId, at: Timestamp) -> Dj {
        let slug = resolve_slug(self.slug, &self.name);
        Dj {
            meta: EntityMeta::pending(id, slug, at),
            name: self.name.trim().to_string(),
            bio: self.bio,
            genres: self.genres,
            image_url: self.image_url,
            links: self.links,
        }
    }
}

/// Partial update for a [`Dj`].
#[derive(Debug, Clone, Default)]
pub struct DjPatch {
    /// New slug.
    pub slug: Option<String>,
    /// New artist name.
    pub name: Option<String>,
    /// New biography.
    pub bio: Option<Option<String>>,
    /// Replacement genre list.
    pub genres: Option<Vec<String>>,
    /// New press photo.
    pub image_url: Option<Option<String>>,
    /// Replacement link list.
    pub links: Option<Vec<String>>,
}

impl Patch for DjPatch {
    type Entity = Dj;

    fn apply_to(&self, dj: &mut Dj) {
        patch_field(&mut dj.meta.slug, &self.slug);
        patch_field(&mut dj.name, &self.name);
        patch_field(&mut dj.bio, &self.bio);
        patch_field(&mut dj.genres, &self.genres);
        patch_field(&mut dj.image_url, &self.image_url);
        patch_field(&mut dj.links, &self.links);
    }

    fn is_empty(&self) -> bool {
        self.slug.is_none()
            && self.name.is_none()
            && self.bio.is_none()
            && self.genres.is_none()
            && self.image_url.is_none()
            && self.links.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::now;

    #[test]
    fn blank_name_rejected() {
        let dj = DjDraft::new("   ")
            .with_slug("anon")
            .into_entity(EntityId::new("d1"), now());
        assert!(dj.validate().is_err());
    }

    #[test]
    fn patch_renames() {
        let mut dj = DjDraft::new("Ellen Allien").into_entity(EntityId::new("d1"), now());
        assert_eq!(dj.slug(), "ellen-allien");

        DjPatch {
            name: Some("Ellen A.".into()),
            ..DjPatch::default()
        }
        .apply_to(&mut dj);
        assert_eq!(dj.name, "Ellen A.");
        assert_eq!(dj.slug(), "ellen-allien");
    }
}
