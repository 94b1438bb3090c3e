//! # Nightlife Core
//!
//! Normalized in-memory data for the nightlife directory.
//!
//! This crate provides:
//! - Entity types (events, DJs, clubs, promoters) with typed drafts and patches
//! - An entity store with id and slug indices per kind
//! - A shared, observable store publishing changes to subscribers
//! - A relational resolver for cross-entity joins
//! - Snapshots for persistence
//!
//! ## Key Invariants
//!
//! - Ids and slugs are unique within an entity kind
//! - Indices are consistent with the collection after every operation
//! - References are weak: a missing target resolves to absent, never panics
//! - Moderation status only moves from pending to approved or rejected

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod entity;
mod error;
mod resolver;
mod slug;
mod snapshot;
mod store;
mod types;

pub use change_feed::{Change, ChangeEvent, ChangeFeed, ChangeType, Interest};
pub use entity::{
    Club, ClubDraft, ClubPatch, Dj, DjDraft, DjPatch, Draft, Entity, EntityId, EntityMeta, Event,
    EventDraft, EventPatch, Patch, Promoter, PromoterDraft, PromoterPatch, Reference,
};
pub use error::{CoreError, CoreResult};
pub use resolver::{DanglingReference, RelationalResolver};
pub use slug::{slugify, validate_slug, MAX_SLUG_LEN};
pub use snapshot::StoreSnapshot;
pub use store::{Collection, EntityStore, Removed, Skipped, Store, StoreView};
pub use types::{now, EntityKind, Status, Timestamp};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
