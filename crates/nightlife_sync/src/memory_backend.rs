//! An in-process backend for tests and demos.

use crate::backend::{Backend, BackendOp, Document};
use crate::error::{DataError, DataResult};
use crate::identity::Identity;
use async_trait::async_trait;
use nightlife_core::{now, Entity, EntityId, EntityKind, Status};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<EntityKind, Vec<Document>>,
    next_id: HashMap<EntityKind, u64>,
    failures: HashMap<(EntityKind, BackendOp), VecDeque<DataError>>,
    calls: HashMap<(EntityKind, BackendOp), usize>,
    latency: Duration,
    op_latency: HashMap<BackendOp, Duration>,
}

/// A backend holding its collections in memory.
///
/// Behaves like the real service where it matters to callers: it assigns
/// ids (`evt-1`, `dj-1`, `club-1`, `promo-1`), rejects duplicate slugs and
/// only moderates pending records. Failures and latency can be injected.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    offline: AtomicBool,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores typed records as-is, keeping their ids and statuses.
    pub fn seed<T: Entity>(&self, records: &[T]) -> DataResult<()> {
        let documents = records
            .iter()
            .map(|record| record.to_document().map_err(DataError::from))
            .collect::<DataResult<Vec<_>>>()?;
        self.inner
            .lock()
            .collections
            .entry(T::KIND)
            .or_default()
            .extend(documents);
        Ok(())
    }

    /// Stores a raw document without any checks.
    pub fn insert_raw(&self, kind: EntityKind, document: Document) {
        self.inner
            .lock()
            .collections
            .entry(kind)
            .or_default()
            .push(document);
    }

    /// Makes the next `op` on `kind` fail with `error`. Calls queue up.
    pub fn fail_next(&self, kind: EntityKind, op: BackendOp, error: DataError) {
        self.inner
            .lock()
            .failures
            .entry((kind, op))
            .or_default()
            .push_back(error);
    }

    /// While offline every call fails with a retryable network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    /// Delay applied to one operation, overriding the global latency.
    pub fn set_op_latency(&self, op: BackendOp, latency: Duration) {
        self.inner.lock().op_latency.insert(op, latency);
    }

    /// How often `op` was called on `kind`.
    pub fn calls(&self, kind: EntityKind, op: BackendOp) -> usize {
        self.inner
            .lock()
            .calls
            .get(&(kind, op))
            .copied()
            .unwrap_or(0)
    }

    /// How often `op` was called across all kinds.
    pub fn total_calls(&self, op: BackendOp) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|((_, called), _)| *called == op)
            .map(|(_, count)| count)
            .sum()
    }

    /// Current contents of a collection.
    pub fn records(&self, kind: EntityKind) -> Vec<Document> {
        self.inner
            .lock()
            .collections
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// One stored record.
    pub fn record(&self, kind: EntityKind, id: &str) -> Option<Document> {
        let inner = self.inner.lock();
        let records = inner.collections.get(&kind)?;
        records
            .iter()
            .find(|doc| document_id(doc).as_deref() == Some(id))
            .cloned()
    }

    async fn enter(&self, kind: EntityKind, op: BackendOp) -> DataResult<()> {
        let (latency, injected) = {
            let mut inner = self.inner.lock();
            *inner.calls.entry((kind, op)).or_default() += 1;
            let latency = inner.op_latency.get(&op).copied().unwrap_or(inner.latency);
            let injected = inner
                .failures
                .get_mut(&(kind, op))
                .and_then(VecDeque::pop_front);
            (latency, injected)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(DataError::network_retryable("backend unreachable"));
        }
        match injected {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn moderate(
        &self,
        kind: EntityKind,
        id: &EntityId,
        identity: &Identity,
        to: Status,
    ) -> DataResult<Document> {
        let mut inner = self.inner.lock();
        let record = inner
            .collections
            .get_mut(&kind)
            .and_then(|records| find_mut(records, id))
            .ok_or_else(|| DataError::not_found(kind, id.as_str()))?;

        let current = record
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("pending")
            .to_ascii_lowercase();
        if current != Status::Pending.as_str() {
            return Err(DataError::conflict(
                kind,
                format!("{id} is already {current}"),
            ));
        }

        let object = as_object_mut(record)?;
        object.insert("status".into(), Value::String(to.as_str().into()));
        object.insert("moderatedBy".into(), Value::String(identity.user_id.clone()));
        touch(object, "updatedAt");
        Ok(record.clone())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list(&self, kind: EntityKind) -> DataResult<Vec<Document>> {
        self.enter(kind, BackendOp::List).await?;
        Ok(self.records(kind))
    }

    async fn get(&self, kind: EntityKind, id: &EntityId) -> DataResult<Option<Document>> {
        self.enter(kind, BackendOp::Get).await?;
        Ok(self.record(kind, id))
    }

    async fn create(
        &self,
        kind: EntityKind,
        mut document: Document,
        identity: &Identity,
    ) -> DataResult<Document> {
        self.enter(kind, BackendOp::Create).await?;
        let mut inner = self.inner.lock();

        let slug = document_slug(&document)?;
        let records = inner.collections.entry(kind).or_default();
        let clash = records
            .iter()
            .any(|doc| doc.get("slug").and_then(Value::as_str) == Some(slug.as_str()));
        if clash {
            return Err(DataError::conflict(kind, format!("slug '{slug}' is taken")));
        }

        let id = loop {
            let counter = inner.next_id.entry(kind).or_default();
            *counter += 1;
            let candidate = format!("{}-{}", id_prefix(kind), counter);
            let taken = inner
                .collections
                .get(&kind)
                .is_some_and(|records| find(records, &candidate).is_some());
            if !taken {
                break candidate;
            }
        };

        let object = as_object_mut(&mut document)?;
        object.insert("id".into(), Value::String(id));
        object.insert("status".into(), Value::String(Status::Pending.as_str().into()));
        object.insert("createdBy".into(), Value::String(identity.user_id.clone()));
        if !object.contains_key("createdAt") {
            touch(object, "createdAt");
        }
        touch(object, "updatedAt");

        inner.collections.entry(kind).or_default().push(document.clone());
        Ok(document)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        mut document: Document,
        _identity: &Identity,
    ) -> DataResult<Document> {
        self.enter(kind, BackendOp::Update).await?;
        let mut inner = self.inner.lock();
        let records = inner.collections.entry(kind).or_default();

        let slug = document_slug(&document)?;
        let clash = records.iter().any(|doc| {
            doc.get("slug").and_then(Value::as_str) == Some(slug.as_str())
                && document_id(doc).as_deref() != Some(id.as_str())
        });
        if clash {
            return Err(DataError::conflict(kind, format!("slug '{slug}' is taken")));
        }

        let stored = find_mut(records, id).ok_or_else(|| DataError::not_found(kind, id.as_str()))?;
        let status = stored.get("status").cloned();
        let created_at = stored.get("createdAt").cloned();

        let object = as_object_mut(&mut document)?;
        object.insert("id".into(), Value::String(id.to_string()));
        if let Some(status) = status {
            object.insert("status".into(), status);
        }
        if let Some(created_at) = created_at {
            object.insert("createdAt".into(), created_at);
        }
        touch(object, "updatedAt");

        *stored = document.clone();
        Ok(document)
    }

    async fn delete(
        &self,
        kind: EntityKind,
        id: &EntityId,
        _identity: &Identity,
    ) -> DataResult<()> {
        self.enter(kind, BackendOp::Delete).await?;
        let mut inner = self.inner.lock();
        let records = inner.collections.entry(kind).or_default();
        let position =
            find(records, id).ok_or_else(|| DataError::not_found(kind, id.as_str()))?;
        records.remove(position);
        Ok(())
    }

    async fn approve(
        &self,
        kind: EntityKind,
        id: &EntityId,
        identity: &Identity,
    ) -> DataResult<Document> {
        self.enter(kind, BackendOp::Approve).await?;
        self.moderate(kind, id, identity, Status::Approved)
    }

    async fn reject(
        &self,
        kind: EntityKind,
        id: &EntityId,
        identity: &Identity,
    ) -> DataResult<Document> {
        self.enter(kind, BackendOp::Reject).await?;
        self.moderate(kind, id, identity, Status::Rejected)
    }
}

fn id_prefix(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Event => "evt",
        EntityKind::Dj => "dj",
        EntityKind::Club => "club",
        EntityKind::Promoter => "promo",
    }
}

fn document_id(document: &Document) -> Option<String> {
    match document.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn document_slug(document: &Document) -> DataResult<String> {
    document
        .get("slug")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| DataError::validation("slug is required"))
}

fn find(records: &[Document], id: &str) -> Option<usize> {
    records
        .iter()
        .position(|doc| document_id(doc).as_deref() == Some(id))
}

fn find_mut<'a>(records: &'a mut [Document], id: &str) -> Option<&'a mut Document> {
    records
        .iter_mut()
        .find(|doc| document_id(doc).as_deref() == Some(id))
}

fn as_object_mut(document: &mut Document) -> DataResult<&mut Map<String, Value>> {
    document
        .as_object_mut()
        .ok_or_else(|| DataError::validation("record must be a JSON object"))
}

fn touch(object: &mut Map<String, Value>, field: &str) {
    object.insert(field.into(), Value::String(now().to_rfc3339()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn ana() -> Identity {
        Identity::new("u1", "Ana")
    }

    #[tokio::test]
    async fn create_assigns_prefixed_ids() {
        let backend = MemoryBackend::new();
        let first = backend
            .create(EntityKind::Event, json!({"slug": "opening", "title": "Opening"}), &ana())
            .await
            .unwrap();
        let second = backend
            .create(EntityKind::Promoter, json!({"slug": "ostgut", "name": "Ostgut"}), &ana())
            .await
            .unwrap();

        assert_eq!(first["id"], "evt-1");
        assert_eq!(first["status"], "pending");
        assert_eq!(first["createdBy"], "u1");
        assert_eq!(second["id"], "promo-1");
        assert_eq!(backend.records(EntityKind::Event).len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_slug() {
        let backend = MemoryBackend::new();
        backend.insert_raw(EntityKind::Club, json!({"id": "c1", "slug": "tresor", "name": "Tresor"}));

        let err = backend
            .create(EntityKind::Club, json!({"slug": "tresor", "name": "Tresor"}), &ana())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn moderation_only_from_pending() {
        let backend = MemoryBackend::new();
        backend.insert_raw(EntityKind::Dj, json!({"id": 7, "slug": "surgeon", "name": "Surgeon"}));
        let id = EntityId::new("7");

        let approved = backend.approve(EntityKind::Dj, &id, &ana()).await.unwrap();
        assert_eq!(approved["status"], "approved");

        let err = backend.reject(EntityKind::Dj, &id, &ana()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn update_keeps_status_and_id() {
        let backend = MemoryBackend::new();
        backend.insert_raw(
            EntityKind::Club,
            json!({"id": "c1", "slug": "tresor", "name": "Tresor", "status": "approved"}),
        );

        let updated = backend
            .update(
                EntityKind::Club,
                &EntityId::new("c1"),
                json!({"id": "other", "slug": "tresor", "name": "Tresor Berlin", "status": "pending"}),
                &ana(),
            )
            .await
            .unwrap();
        assert_eq!(updated["id"], "c1");
        assert_eq!(updated["status"], "approved");
        assert_eq!(updated["name"], "Tresor Berlin");
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let backend = MemoryBackend::new();
        backend.fail_next(EntityKind::Club, BackendOp::List, DataError::network_retryable("reset"));

        assert!(backend.list(EntityKind::Club).await.is_err());
        assert!(backend.list(EntityKind::Club).await.is_ok());
        assert!(backend.list(EntityKind::Event).await.is_ok());
        assert_eq!(backend.calls(EntityKind::Club, BackendOp::List), 2);
        assert_eq!(backend.total_calls(BackendOp::List), 3);
    }

    #[tokio::test]
    async fn offline_fails_everything() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        let err = backend.list(EntityKind::Event).await.unwrap_err();
        assert!(err.is_retryable());

        backend.set_offline(false);
        let err = backend
            .delete(EntityKind::Event, &EntityId::new("missing"), &ana())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
