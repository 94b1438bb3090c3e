//! The backend seam.
//!
//! A backend stores one collection per entity kind and exchanges records as
//! JSON documents. Implementations map their own failures onto [`DataError`].

use crate::error::DataResult;
use crate::identity::Identity;
use async_trait::async_trait;
use nightlife_core::{EntityId, EntityKind};
use std::fmt;
use std::sync::Arc;

/// A record as it travels over the wire.
pub type Document = serde_json::Value;

/// Backend operations, used for failure injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    /// Fetch a whole collection.
    List,
    /// Fetch one record.
    Get,
    /// Create a record.
    Create,
    /// Update a record.
    Update,
    /// Delete a record.
    Delete,
    /// Approve a pending record.
    Approve,
    /// Reject a pending record.
    Reject,
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendOp::List => "list",
            BackendOp::Get => "get",
            BackendOp::Create => "create",
            BackendOp::Update => "update",
            BackendOp::Delete => "delete",
            BackendOp::Approve => "approve",
            BackendOp::Reject => "reject",
        })
    }
}

/// Remote storage for the directory.
///
/// Writes carry the caller identity for attribution. Created, updated and
/// moderated records are returned as the backend now stores them.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Every record of `kind`.
    async fn list(&self, kind: EntityKind) -> DataResult<Vec<Document>>;

    /// One record, if it exists.
    async fn get(&self, kind: EntityKind, id: &EntityId) -> DataResult<Option<Document>>;

    /// Stores a new record and assigns its id.
    async fn create(
        &self,
        kind: EntityKind,
        document: Document,
        identity: &Identity,
    ) -> DataResult<Document>;

    /// Overwrites an existing record.
    async fn update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        document: Document,
        identity: &Identity,
    ) -> DataResult<Document>;

    /// Removes a record.
    async fn delete(&self, kind: EntityKind, id: &EntityId, identity: &Identity)
        -> DataResult<()>;

    /// Moves a pending record to approved.
    async fn approve(
        &self,
        kind: EntityKind,
        id: &EntityId,
        identity: &Identity,
    ) -> DataResult<Document>;

    /// Moves a pending record to rejected.
    async fn reject(
        &self,
        kind: EntityKind,
        id: &EntityId,
        identity: &Identity,
    ) -> DataResult<Document>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn list(&self, kind: EntityKind) -> DataResult<Vec<Document>> {
        (**self).list(kind).await
    }

    async fn get(&self, kind: EntityKind, id: &EntityId) -> DataResult<Option<Document>> {
        (**self).get(kind, id).await
    }

    async fn create(
        &self,
        kind: EntityKind,
        document: Document,
        identity: &Identity,
    ) -> DataResult<Document> {
        (**self).create(kind, document, identity).await
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        document: Document,
        identity: &Identity,
    ) -> DataResult<Document> {
        (**self).update(kind, id, document, identity).await
    }

    async fn delete(
        &self,
        kind: EntityKind,
        id: &EntityId,
        identity: &Identity,
    ) -> DataResult<()> {
        (**self).delete(kind, id, identity).await
    }

    async fn approve(
        &self,
        kind: EntityKind,
        id: &EntityId,
        identity: &Identity,
    ) -> DataResult<Document> {
        (**self).approve(kind, id, identity).await
    }

    async fn reject(
        &self,
        kind: EntityKind,
        id: &EntityId,
        identity: &Identity,
    ) -> DataResult<Document> {
        (**self).reject(kind, id, identity).await
    }
}
