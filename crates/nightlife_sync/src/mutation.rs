//! Optimistic writes with rollback.
//!
//! Every mutation follows the same shape: check identity, take the entity's
//! turn in the per-id queue, apply the effect to the store and keep its
//! inverse as a [`Transaction`], call the backend, then either commit the
//! backend's version of the record or replay the inverse.

use crate::backend::{Backend, Document};
use crate::config::DataConfig;
use crate::error::{DataError, DataResult};
use crate::identity::IdentityProvider;
use crate::monitor::ConnectionMonitor;
use crate::queue::KeyedQueue;
use crate::reservation::{Reservation, SlugReservations};
use crate::retry::with_retry;
use crate::tracker::WriteTracker;
use nightlife_core::{
    now, Draft, Entity, EntityId, EntityKind, EntityStore, Patch, Reference, Removed, Status,
    Store,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// How to undo an optimistic effect.
#[derive(Debug, Clone, PartialEq)]
pub enum Inverse<T> {
    /// Undo an insert.
    Remove,
    /// Undo a removal, at the original position.
    Restore {
        /// The removed entity.
        entity: T,
        /// Its index in the collection.
        position: usize,
    },
    /// Undo an in-place change.
    Revert(T),
}

/// An applied optimistic effect and its inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction<T: Entity> {
    /// Kind of the entity touched.
    pub kind: EntityKind,
    /// Id of the entity touched.
    pub id: EntityId,
    /// How to undo it.
    pub inverse: Inverse<T>,
}

impl<T: Entity> Transaction<T> {
    fn inserted(id: EntityId) -> Self {
        Self {
            kind: T::KIND,
            id,
            inverse: Inverse::Remove,
        }
    }

    fn removed(removed: Removed<T>) -> Self {
        Self {
            kind: T::KIND,
            id: removed.entity.id().clone(),
            inverse: Inverse::Restore {
                entity: removed.entity,
                position: removed.position,
            },
        }
    }

    fn changed(prior: T) -> Self {
        Self {
            kind: T::KIND,
            id: prior.id().clone(),
            inverse: Inverse::Revert(prior),
        }
    }

    /// Replays the inverse against `store`.
    pub fn rollback(self, store: &Store) -> DataResult<()> {
        let id = self.id;
        store.write(|s| match self.inverse {
            Inverse::Remove => {
                s.remove::<T>(&id);
                Ok(())
            }
            Inverse::Restore { entity, position } => s.restore(Removed { position, entity }),
            Inverse::Revert(prior) => s.replace(prior).map(drop),
        })?;
        Ok(())
    }
}

/// Applies create, update, delete and moderation writes.
pub struct MutationPipeline<B: Backend> {
    backend: Arc<B>,
    store: Arc<Store>,
    monitor: Arc<ConnectionMonitor>,
    tracker: Arc<WriteTracker>,
    identity: Arc<dyn IdentityProvider>,
    config: DataConfig,
    queue: KeyedQueue,
    slugs: Arc<SlugReservations>,
}

impl<B: Backend> MutationPipeline<B> {
    /// Creates a pipeline writing into `store`.
    pub fn new(
        backend: Arc<B>,
        store: Arc<Store>,
        monitor: Arc<ConnectionMonitor>,
        tracker: Arc<WriteTracker>,
        identity: Arc<dyn IdentityProvider>,
        config: DataConfig,
    ) -> Self {
        Self {
            backend,
            store,
            monitor,
            tracker,
            identity,
            config,
            queue: KeyedQueue::new(),
            slugs: Arc::new(SlugReservations::new()),
        }
    }

    /// Creates an entity from a draft.
    ///
    /// The entity is visible under a temporary id until the backend assigns
    /// the real one; every reference to the temporary id is then rewritten.
    pub async fn add<T: Entity>(&self, draft: T::Draft) -> DataResult<T> {
        self.report(self.add_inner::<T>(draft)).await
    }

    /// Applies a patch to an existing entity.
    pub async fn update<T: Entity>(&self, id: &str, patch: T::Patch) -> DataResult<T> {
        self.report(self.update_inner::<T>(EntityId::new(id), patch))
            .await
    }

    /// Deletes an entity; returns it as it was.
    pub async fn remove<T: Entity>(&self, id: &str) -> DataResult<T> {
        self.report(self.remove_inner::<T>(EntityId::new(id))).await
    }

    /// Moves a pending entity to approved.
    pub async fn approve<T: Entity>(&self, id: &str) -> DataResult<T> {
        self.report(self.moderate::<T>(EntityId::new(id), Status::Approved))
            .await
    }

    /// Moves a pending entity to rejected.
    pub async fn reject<T: Entity>(&self, id: &str) -> DataResult<T> {
        self.report(self.moderate::<T>(EntityId::new(id), Status::Rejected))
            .await
    }

    async fn report<T>(&self, op: impl Future<Output = DataResult<T>>) -> DataResult<T> {
        let result = op.await;
        if let Err(error) = &result {
            self.monitor.record_mutation_failure(error);
        }
        result
    }

    async fn add_inner<T: Entity>(&self, draft: T::Draft) -> DataResult<T> {
        let identity = self.identity.require()?;
        let temp_id = EntityId::temporary();
        let entity = draft.into_entity(temp_id.clone(), now());
        entity.validate()?;

        let _turn = self.queue.acquire(T::KIND, &temp_id).await;
        let _write = self.tracker.begin(T::KIND);
        self.store.write(|s| -> DataResult<()> {
            self.slugs.check(T::KIND, entity.slug(), &temp_id)?;
            check_new_references(s, &entity, &[])?;
            s.insert(entity.clone())?;
            Ok(())
        })?;
        let tx = Transaction::<T>::inserted(temp_id.clone());

        let mut document = entity.to_document()?;
        if let Some(object) = document.as_object_mut() {
            object.remove("id");
        }
        let response = self
            .call(|| self.backend.create(T::KIND, document.clone(), &identity))
            .await;

        let committed = decode::<T>(response).and_then(|created| {
            self.store.write(|s| -> DataResult<T> {
                s.rekey::<T>(&temp_id, created.id())?;
                if let Err(error) = s.replace(created.clone()) {
                    s.remove::<T>(created.id());
                    return Err(error.into());
                }
                Ok(created)
            })
        });
        match committed {
            Ok(created) => {
                debug!(kind = %T::KIND, temp = %temp_id, id = %created.id(), "created");
                Ok(created)
            }
            Err(error) => {
                self.roll_back(tx, &error);
                Err(error)
            }
        }
    }

    async fn update_inner<T: Entity>(&self, id: EntityId, patch: T::Patch) -> DataResult<T> {
        let identity = self.identity.require()?;
        let _turn = self.queue.acquire(T::KIND, &id).await;

        if patch.is_empty() {
            return self
                .store
                .read()
                .get_by_id::<T>(&id)
                .cloned()
                .ok_or_else(|| DataError::not_found(T::KIND, id.as_str()));
        }

        let _write = self.tracker.begin(T::KIND);
        let (prior, updated, _freed) = self
            .store
            .write(|s| -> DataResult<(T, T, Option<Reservation>)> {
                let prior = s
                    .get_by_id::<T>(&id)
                    .cloned()
                    .ok_or_else(|| DataError::not_found(T::KIND, id.as_str()))?;
                let mut updated = prior.clone();
                patch.apply_to(&mut updated);
                updated.meta_mut().updated_at = now();
                updated.validate()?;
                self.slugs.check(T::KIND, updated.slug(), &id)?;
                check_new_references(s, &updated, &prior.references())?;
                s.replace(updated.clone())?;
                let freed = (prior.slug() != updated.slug())
                    .then(|| self.slugs.reserve(T::KIND, prior.slug(), &id));
                Ok((prior, updated, freed))
            })?;
        let tx = Transaction::changed(prior);

        let response = match updated.to_document() {
            Ok(document) => {
                self.call(|| self.backend.update(T::KIND, &id, document.clone(), &identity))
                    .await
            }
            Err(error) => Err(error.into()),
        };
        self.commit(tx, response)
    }

    async fn remove_inner<T: Entity>(&self, id: EntityId) -> DataResult<T> {
        let identity = self.identity.require()?;
        if id.is_temporary() {
            return Err(DataError::conflict(
                T::KIND,
                format!("{id} has not been saved yet"),
            ));
        }

        let _turn = self.queue.acquire(T::KIND, &id).await;
        let _write = self.tracker.begin(T::KIND);
        let (removed, _freed) = self
            .store
            .write(|s| -> Option<(Removed<T>, Reservation)> {
                let removed = s.remove::<T>(&id)?;
                let freed = self.slugs.reserve(T::KIND, removed.entity.slug(), &id);
                Some((removed, freed))
            })
            .ok_or_else(|| DataError::not_found(T::KIND, id.as_str()))?;
        let entity = removed.entity.clone();
        let tx = Transaction::removed(removed);

        let response = self
            .call(|| self.backend.delete(T::KIND, &id, &identity))
            .await;
        match response {
            Ok(()) => {
                debug!(kind = %T::KIND, %id, "deleted");
                Ok(entity)
            }
            Err(DataError::NotFound { .. }) => {
                debug!(kind = %T::KIND, %id, "already gone on the backend");
                Ok(entity)
            }
            Err(error) => {
                self.roll_back(tx, &error);
                Err(error)
            }
        }
    }

    async fn moderate<T: Entity>(&self, id: EntityId, target: Status) -> DataResult<T> {
        let identity = self.identity.require()?;
        let _turn = self.queue.acquire(T::KIND, &id).await;
        // A refused transition must not register as a write.
        moderatable::<T>(&self.store.read(), &id, target)?;
        let _write = self.tracker.begin(T::KIND);

        let prior = self.store.write(|s| -> DataResult<T> {
            let prior = moderatable::<T>(s, &id, target)?;
            let mut updated = prior.clone();
            updated.meta_mut().status = target;
            updated.meta_mut().updated_at = now();
            s.replace(updated)?;
            Ok(prior)
        })?;
        let tx = Transaction::changed(prior);

        let response = match target {
            Status::Rejected => {
                self.call(|| self.backend.reject(T::KIND, &id, &identity))
                    .await
            }
            _ => {
                self.call(|| self.backend.approve(T::KIND, &id, &identity))
                    .await
            }
        };
        match response {
            Err(error @ DataError::Conflict { .. }) => {
                self.roll_back(tx, &error);
                self.resync::<T>(&id).await;
                Err(error)
            }
            response => self.commit(tx, response),
        }
    }

    // The backend refused because its copy differs; take its copy.
    async fn resync<T: Entity>(&self, id: &EntityId) {
        let current = match self.call(|| self.backend.get(T::KIND, id)).await {
            Ok(Some(document)) => T::from_document(document)
                .map(Some)
                .map_err(DataError::from),
            Ok(None) => Ok(None),
            Err(error) => Err(error),
        };
        let applied = match current {
            Ok(Some(current)) => self.store.write(|s| s.replace(current).map(drop)),
            Ok(None) => {
                self.store.write(|s| s.remove::<T>(id));
                Ok(())
            }
            Err(error) => {
                warn!(kind = %T::KIND, %id, %error, "could not re-read record");
                return;
            }
        };
        match applied {
            Ok(()) => debug!(kind = %T::KIND, %id, "resynced from backend"),
            Err(error) => warn!(kind = %T::KIND, %id, %error, "could not apply backend copy"),
        }
    }

    // Replaces the optimistic version with the backend's, or rolls back.
    fn commit<T: Entity>(
        &self,
        tx: Transaction<T>,
        response: DataResult<Document>,
    ) -> DataResult<T> {
        let committed = decode::<T>(response).and_then(|confirmed| {
            self.store.write(|s| s.replace(confirmed.clone()))?;
            Ok(confirmed)
        });
        match committed {
            Ok(confirmed) => {
                debug!(kind = %T::KIND, id = %confirmed.id(), status = %confirmed.status(), "committed");
                Ok(confirmed)
            }
            Err(error) => {
                self.roll_back(tx, &error);
                Err(error)
            }
        }
    }

    fn roll_back<T: Entity>(&self, tx: Transaction<T>, cause: &DataError) {
        warn!(kind = %tx.kind, id = %tx.id, error = %cause, "mutation failed, rolling back");
        let (kind, id) = (tx.kind, tx.id.clone());
        if let Err(error) = tx.rollback(&self.store) {
            warn!(%kind, %id, %error, "rollback could not be applied");
        }
    }

    async fn call<R, F, Fut>(&self, op: F) -> DataResult<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DataResult<R>>,
    {
        let (result, _) = with_retry(
            &self.config.mutation_retry,
            self.config.request_timeout,
            op,
            |attempt, error| warn!(attempt, %error, "backend write failed, retrying"),
        )
        .await;
        result
    }
}

impl<B: Backend> std::fmt::Debug for MutationPipeline<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationPipeline")
            .field("store", &self.store)
            .field("queued_ids", &self.queue.len())
            .field("reserved_slugs", &self.slugs.len())
            .finish_non_exhaustive()
    }
}

fn moderatable<T: Entity>(store: &EntityStore, id: &EntityId, target: Status) -> DataResult<T> {
    let current = store
        .get_by_id::<T>(id)
        .cloned()
        .ok_or_else(|| DataError::not_found(T::KIND, id.as_str()))?;
    if !current.status().can_transition_to(target) {
        return Err(DataError::conflict(
            T::KIND,
            format!("{id} is {}, only pending records can be {target}", current.status()),
        ));
    }
    Ok(current)
}

fn decode<T: Entity>(response: DataResult<Document>) -> DataResult<T> {
    Ok(T::from_document(response?)?)
}

// References added by a write must resolve; ones the entity already had may dangle.
fn check_new_references<T: Entity>(
    store: &EntityStore,
    entity: &T,
    existing: &[Reference],
) -> DataResult<()> {
    for reference in entity.references() {
        if !existing.contains(&reference) && !store.resolves(&reference) {
            return Err(DataError::validation(format!(
                "{} {} references unknown {reference}",
                T::KIND,
                entity.id()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendOp;
    use crate::config::RetryConfig;
    use crate::error::ErrorKind;
    use crate::identity::{Identity, StaticIdentity};
    use crate::memory_backend::MemoryBackend;
    use nightlife_core::{
        ChangeType, Club, ClubDraft, ClubPatch, Dj, DjDraft, Event, EventDraft, EventPatch,
        Interest,
    };
    use std::time::Duration;

    struct Harness {
        backend: Arc<MemoryBackend>,
        store: Arc<Store>,
        monitor: Arc<ConnectionMonitor>,
        identity: Arc<StaticIdentity>,
        tracker: Arc<WriteTracker>,
        pipeline: Arc<MutationPipeline<MemoryBackend>>,
    }

    fn harness() -> Harness {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(Store::new());
        let monitor = Arc::new(ConnectionMonitor::new());
        let identity = Arc::new(StaticIdentity::signed_in(Identity::new("admin", "Admin")));
        let config = DataConfig::new().with_mutation_retry(
            RetryConfig::new(2)
                .with_initial_delay(Duration::from_millis(1))
                .with_jitter(false),
        );
        let tracker = Arc::new(WriteTracker::new());
        let pipeline = Arc::new(MutationPipeline::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            Arc::clone(&monitor),
            Arc::clone(&tracker),
            identity.clone(),
            config,
        ));
        Harness {
            backend,
            store,
            monitor,
            identity,
            tracker,
            pipeline,
        }
    }

    async fn seeded_club(h: &Harness) -> Club {
        h.pipeline
            .add::<Club>(ClubDraft::new("Tresor"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn add_swaps_temporary_id() {
        let h = harness();
        let rx = h.store.subscribe(Interest::Kind(EntityKind::Club));

        let club = seeded_club(&h).await;

        assert_eq!(club.id().as_str(), "club-1");
        assert_eq!(club.status(), Status::Pending);
        let store = h.store.read();
        assert_eq!(store.count(EntityKind::Club), 1);
        assert_eq!(store.get_by_slug::<Club>("tresor").unwrap().id(), club.id());

        let changes: Vec<_> = rx.try_iter().map(|e| e.change_type).collect();
        assert_eq!(changes[0], ChangeType::Insert);
        assert!(matches!(changes[1], ChangeType::Rekey { .. }));
    }

    #[tokio::test]
    async fn failed_add_removes_temporary_entity() {
        let h = harness();
        h.backend.fail_next(
            EntityKind::Club,
            BackendOp::Create,
            DataError::validation("name rejected"),
        );

        let err = h.pipeline.add::<Club>(ClubDraft::new("Tresor")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(h.store.read().count(EntityKind::Club), 0);
        assert!(h.monitor.error().is_some());
    }

    #[tokio::test]
    async fn add_rejects_unknown_references() {
        let h = harness();
        let err = h
            .pipeline
            .add::<Event>(EventDraft::new("Opening").at_club("nowhere"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(h.backend.total_calls(BackendOp::Create), 0);
    }

    #[tokio::test]
    async fn add_without_identity_has_no_effect() {
        let h = harness();
        h.identity.set(None);

        let err = h.pipeline.add::<Dj>(DjDraft::new("Surgeon")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(h.store.sequence(), 0);
    }

    #[tokio::test]
    async fn update_applies_backend_version() {
        let h = harness();
        let club = seeded_club(&h).await;

        let updated = h
            .pipeline
            .update::<Club>(club.id(), ClubPatch {
                    name: Some("Tresor Berlin".into()),
                    ..Default::default()
                })
            .await
            .unwrap();

        assert_eq!(updated.name, "Tresor Berlin");
        assert_eq!(h.store.read().get_by_id::<Club>(club.id()).unwrap().name, "Tresor Berlin");
        let record = h.backend.record(EntityKind::Club, club.id()).unwrap();
        assert_eq!(record["name"], "Tresor Berlin");
    }

    #[tokio::test]
    async fn failed_update_restores_prior_state() {
        let h = harness();
        let club = seeded_club(&h).await;
        let before = h.store.read().get_by_id::<Club>(club.id()).cloned().unwrap();
        h.backend.set_offline(true);

        let err = h
            .pipeline
            .update::<Club>(club.id(), ClubPatch {
                    slug: Some("tresor-berlin".into()),
                    ..Default::default()
                })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
        let store = h.store.read();
        assert_eq!(store.get_by_id::<Club>(club.id()), Some(&before));
        assert!(store.get_by_slug::<Club>("tresor-berlin").is_none());
        assert!(store.get_by_slug::<Club>("tresor").is_some());
    }

    #[tokio::test]
    async fn update_to_taken_slug_conflicts_before_any_call() {
        let h = harness();
        let tresor = seeded_club(&h).await;
        h.pipeline.add::<Club>(ClubDraft::new("Berghain")).await.unwrap();

        let err = h
            .pipeline
            .update::<Club>(tresor.id(), ClubPatch {
                    slug: Some("berghain".into()),
                    ..Default::default()
                })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(h.backend.total_calls(BackendOp::Update), 0);
    }

    #[tokio::test]
    async fn update_may_keep_dangling_reference() {
        let h = harness();
        let club = seeded_club(&h).await;
        let event = h
            .pipeline
            .add::<Event>(EventDraft::new("Opening").at_club(club.id().as_str()))
            .await
            .unwrap();
        h.pipeline.remove::<Club>(club.id()).await.unwrap();

        let updated = h
            .pipeline
            .update::<Event>(event.id(), EventPatch {
                    title: Some("Opening Night".into()),
                    ..Default::default()
                })
            .await
            .unwrap();
        assert_eq!(updated.club_id.as_ref(), Some(club.id()));
    }

    #[tokio::test]
    async fn failed_delete_restores_position() {
        let h = harness();
        seeded_club(&h).await;
        let middle = h.pipeline.add::<Club>(ClubDraft::new("Berghain")).await.unwrap();
        h.pipeline.add::<Club>(ClubDraft::new("Watergate")).await.unwrap();
        h.backend.fail_next(
            EntityKind::Club,
            BackendOp::Delete,
            DataError::unauthorized("admins only"),
        );

        let err = h.pipeline.remove::<Club>(middle.id()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let store = h.store.read();
        assert_eq!(store.list_all::<Club>()[1].id(), middle.id());
        assert!(store.get_by_slug::<Club>("berghain").is_some());
    }

    #[tokio::test]
    async fn delete_of_unsaved_entity_conflicts() {
        let h = harness();
        let err = h
            .pipeline
            .remove::<Club>(EntityId::temporary().as_str())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn approve_then_reject_conflicts() {
        let h = harness();
        let dj = h.pipeline.add::<Dj>(DjDraft::new("Surgeon")).await.unwrap();

        let approved = h.pipeline.approve::<Dj>(dj.id()).await.unwrap();
        assert_eq!(approved.status(), Status::Approved);

        let err = h.pipeline.reject::<Dj>(dj.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = h.pipeline.approve::<Dj>(dj.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(h.store.read().get_by_id::<Dj>(dj.id()).unwrap().status(), Status::Approved);
        assert_eq!(h.backend.total_calls(BackendOp::Reject), 0);
    }

    #[tokio::test]
    async fn failed_approve_reverts_status() {
        let h = harness();
        let dj = h.pipeline.add::<Dj>(DjDraft::new("Surgeon")).await.unwrap();
        h.backend.fail_next(
            EntityKind::Dj,
            BackendOp::Approve,
            DataError::network_fatal("gateway closed"),
        );

        assert!(h.pipeline.approve::<Dj>(dj.id()).await.is_err());
        assert_eq!(h.store.read().get_by_id::<Dj>(dj.id()).unwrap().status(), Status::Pending);
    }

    #[tokio::test]
    async fn mutation_retry_budget_is_two_attempts() {
        let h = harness();
        let dj = h.pipeline.add::<Dj>(DjDraft::new("Surgeon")).await.unwrap();
        for _ in 0..2 {
            h.backend.fail_next(
                EntityKind::Dj,
                BackendOp::Approve,
                DataError::network_retryable("reset"),
            );
        }

        assert!(h.pipeline.approve::<Dj>(dj.id()).await.is_err());
        assert_eq!(h.backend.calls(EntityKind::Dj, BackendOp::Approve), 2);
    }

    #[tokio::test]
    async fn same_id_updates_apply_in_order() {
        let h = harness();
        let club = seeded_club(&h).await;
        h.backend.set_op_latency(BackendOp::Update, Duration::from_millis(20));

        let patch_a = ClubPatch {
            name: Some("A".into()),
            city: Some(Some("Berlin".into())),
            ..Default::default()
        };
        let patch_b = ClubPatch {
            name: Some("B".into()),
            ..Default::default()
        };
        let (a, b) = tokio::join!(
            h.pipeline.update::<Club>(club.id(), patch_a),
            h.pipeline.update::<Club>(club.id(), patch_b),
        );
        a.unwrap();
        b.unwrap();

        let stored = h.store.read().get_by_id::<Club>(club.id()).cloned().unwrap();
        assert_eq!(stored.name, "B");
        assert_eq!(stored.city.as_deref(), Some("Berlin"));
        assert_eq!(h.backend.record(EntityKind::Club, club.id()).unwrap()["name"], "B");
    }

    #[tokio::test]
    async fn slug_freed_by_pending_update_survives_rollback() {
        let h = harness();
        let club = seeded_club(&h).await;
        h.backend.set_op_latency(BackendOp::Update, Duration::from_millis(20));
        h.backend.fail_next(
            EntityKind::Club,
            BackendOp::Update,
            DataError::validation("slug rejected"),
        );

        let (renamed, claimed) = tokio::join!(
            h.pipeline.update::<Club>(club.id(), ClubPatch {
                    slug: Some("tresor-berlin".into()),
                    ..Default::default()
                }),
            h.pipeline.add::<Club>(ClubDraft::new("Tresor")),
        );

        assert_eq!(renamed.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(claimed.unwrap_err().kind(), ErrorKind::Conflict);
        let store = h.store.read();
        assert_eq!(store.get_by_slug::<Club>("tresor").unwrap().id(), club.id());
        assert!(store.get_by_slug::<Club>("tresor-berlin").is_none());
        assert_eq!(store.count(EntityKind::Club), 1);
        assert_eq!(h.backend.total_calls(BackendOp::Create), 1);
    }

    #[tokio::test]
    async fn slug_freed_by_pending_delete_survives_rollback() {
        let h = harness();
        let club = seeded_club(&h).await;
        h.backend.set_op_latency(BackendOp::Delete, Duration::from_millis(20));
        h.backend.fail_next(
            EntityKind::Club,
            BackendOp::Delete,
            DataError::unauthorized("admins only"),
        );

        let (deleted, claimed) = tokio::join!(
            h.pipeline.remove::<Club>(club.id()),
            h.pipeline.add::<Club>(ClubDraft::new("Tresor")),
        );

        assert_eq!(deleted.unwrap_err().kind(), ErrorKind::Unauthorized);
        assert_eq!(claimed.unwrap_err().kind(), ErrorKind::Conflict);
        assert_eq!(
            h.store.read().get_by_slug::<Club>("tresor").unwrap().id(),
            club.id()
        );
    }

    #[tokio::test]
    async fn settled_write_releases_old_slug() {
        let h = harness();
        let club = seeded_club(&h).await;
        h.pipeline
            .update::<Club>(club.id(), ClubPatch {
                    slug: Some("tresor-berlin".into()),
                    ..Default::default()
                })
            .await
            .unwrap();

        let reopened = h.pipeline.add::<Club>(ClubDraft::new("Tresor")).await.unwrap();
        assert_eq!(reopened.slug(), "tresor");
        assert_eq!(h.pipeline.slugs.len(), 0);
    }

    #[tokio::test]
    async fn refused_moderation_registers_no_write() {
        let h = harness();
        let dj = h.pipeline.add::<Dj>(DjDraft::new("Surgeon")).await.unwrap();
        h.pipeline.approve::<Dj>(dj.id()).await.unwrap();
        let generation = h.tracker.tick();

        let err = h.pipeline.reject::<Dj>(dj.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = h.pipeline.approve::<Dj>("dj-404").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert!(h.tracker.is_clean_since(EntityKind::Dj, generation));
    }

    #[tokio::test]
    async fn backend_moderation_conflict_takes_backend_copy() {
        let h = harness();
        let dj = h.pipeline.add::<Dj>(DjDraft::new("Surgeon")).await.unwrap();
        h.backend
            .reject(EntityKind::Dj, dj.id(), &Identity::new("other", "Other Admin"))
            .await
            .unwrap();

        let err = h.pipeline.approve::<Dj>(dj.id()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(h.backend.calls(EntityKind::Dj, BackendOp::Get), 1);
        assert_eq!(
            h.store.read().get_by_id::<Dj>(dj.id()).unwrap().status(),
            Status::Rejected
        );
    }
}
