//! Entity types.
//!
//! Every entity embeds an [`EntityMeta`] carrying the fields the store
//! manages (id, slug, moderation status, timestamps). Creation goes through
//! a typed draft and edits through a typed patch; neither can touch `id`
//! or `status`.

mod club;
mod dj;
mod event;
mod id;
mod promoter;

pub use club::{Club, ClubDraft, ClubPatch};
pub use dj::{Dj, DjDraft, DjPatch};
pub use event::{Event, EventDraft, EventPatch};
pub use id::EntityId;
pub use promoter::{Promoter, PromoterDraft, PromoterPatch};

use crate::error::{CoreError, CoreResult};
use crate::slug::validate_slug;
use crate::store::{Collection, EntityStore};
use crate::types::{now, EntityKind, Status, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-managed attributes shared by every entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    /// Stable identifier.
    pub id: EntityId,
    /// URL-safe key, unique within the entity kind.
    pub slug: String,
    /// Moderation status.
    #[serde(default)]
    pub status: Status,
    /// Creation time.
    #[serde(default = "now")]
    pub created_at: Timestamp,
    /// Last modification time.
    #[serde(default = "now")]
    pub updated_at: Timestamp,
}

impl EntityMeta {
    /// Metadata for a freshly created, pending entity.
    pub fn pending(id: EntityId, slug: impl Into<String>, at: Timestamp) -> Self {
        Self {
            id,
            slug: slug.into(),
            status: Status::Pending,
            created_at: at,
            updated_at: at,
        }
    }
}

/// A weak reference from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Kind of the referenced entity.
    pub kind: EntityKind,
    /// Id of the referenced entity.
    pub id: EntityId,
}

impl Reference {
    /// Creates a reference.
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A record type managed by the store.
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Which kind this type is.
    const KIND: EntityKind;

    /// Typed creation input.
    type Draft: Draft<Entity = Self>;

    /// Typed partial update.
    type Patch: Patch<Entity = Self>;

    /// Store-managed attributes.
    fn meta(&self) -> &EntityMeta;

    /// Mutable store-managed attributes.
    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Human-readable name (title for events).
    fn display_name(&self) -> &str;

    /// Checks the type-specific invariants (required fields and so on).
    fn validate_fields(&self) -> CoreResult<()>;

    /// Outgoing weak references.
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    /// Rewrites a reference to `from` so that it points at `to`.
    ///
    /// Returns true if anything changed.
    fn rewrite_reference(&mut self, _kind: EntityKind, _from: &EntityId, _to: &EntityId) -> bool {
        false
    }

    /// The collection holding this type.
    fn collection(store: &EntityStore) -> &Collection<Self>;

    /// The mutable collection holding this type.
    fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self>;

    /// Entity id.
    fn id(&self) -> &EntityId {
        &self.meta().id
    }

    /// Entity slug.
    fn slug(&self) -> &str {
        &self.meta().slug
    }

    /// Moderation status.
    fn status(&self) -> Status {
        self.meta().status
    }

    /// Validates slug format and the type-specific invariants.
    fn validate(&self) -> CoreResult<()> {
        validate_slug(self.slug())?;
        self.validate_fields()
    }

    /// Encodes the entity as a wire document.
    fn to_document(&self) -> CoreResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decodes an entity from a wire document.
    fn from_document(document: serde_json::Value) -> CoreResult<Self> {
        serde_json::from_value(document)
            .map_err(|e| CoreError::Codec(format!("invalid {} record: {e}", Self::KIND)))
    }
}

/// Typed creation input for an entity.
pub trait Draft: Clone + fmt::Debug + Send + Sync + 'static {
    /// The entity this draft creates.
    type Entity: Entity;

    /// Builds a pending entity with the given id.
    ///
    /// The result still has to pass [`Entity::validate`].
    fn into_entity(self, id: EntityId, at: Timestamp) -> Self::Entity;
}

/// Typed partial update for an entity.
pub trait Patch: Clone + fmt::Debug + Send + Sync + 'static {
    /// The entity this patch applies to.
    type Entity: Entity;

    /// Applies the set fields to `entity`.
    fn apply_to(&self, entity: &mut Self::Entity);

    /// Returns true if no field is set.
    fn is_empty(&self) -> bool;
}

pub(crate) fn require_text(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        Err(CoreError::validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// Picks the explicit slug or derives one from `name`.
pub(crate) fn resolve_slug(slug: Option<String>, name: &str) -> String {
    match slug {
        Some(slug) if !slug.trim().is_empty() => slug.trim().to_string(),
        _ => crate::slug::slugify(name),
    }
}

/// Assigns `value` to `target` when the patch field is set.
pub(crate) fn patch_field<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}
