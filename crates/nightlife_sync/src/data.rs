//! The data layer facade handed to presentation code.

use crate::backend::Backend;
use crate::config::DataConfig;
use crate::engine::{FetchReport, SyncEngine, SyncStats};
use crate::error::{DataError, DataResult};
use crate::identity::{IdentityProvider, StaticIdentity};
use crate::monitor::{ConnectionMonitor, ConnectionStatus, MonitorSnapshot};
use crate::mutation::MutationPipeline;
use crate::persistence::SnapshotStore;
use crate::tracker::WriteTracker;
use nightlife_core::{
    ChangeEvent, Club, ClubDraft, ClubPatch, Dj, DjDraft, DjPatch, Entity, EntityKind, Event,
    EventDraft, EventPatch, Interest, Promoter, PromoterDraft, PromoterPatch, RelationalResolver,
    Store, StoreView,
};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Builds a [`DataLayer`].
pub struct DataLayerBuilder<B: Backend> {
    backend: B,
    identity: Arc<dyn IdentityProvider>,
    persistence: Option<Arc<dyn SnapshotStore>>,
    config: DataConfig,
}

impl<B: Backend> DataLayerBuilder<B> {
    /// Sets the identity source. Defaults to nobody signed in.
    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    /// Enables snapshot persistence.
    pub fn persistence(mut self, persistence: Arc<dyn SnapshotStore>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: DataConfig) -> Self {
        self.config = config;
        self
    }

    /// Wires the store, engine, pipeline and monitor together.
    pub fn build(self) -> DataLayer<B> {
        let backend = Arc::new(self.backend);
        let store = Arc::new(Store::with_feed_history(self.config.feed_history));
        let monitor = Arc::new(ConnectionMonitor::new());
        let tracker = Arc::new(WriteTracker::new());

        let mut engine = SyncEngine::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            Arc::clone(&monitor),
            Arc::clone(&tracker),
            self.config.clone(),
        );
        if let Some(persistence) = self.persistence {
            engine = engine.with_persistence(persistence);
        }
        let pipeline = MutationPipeline::new(
            backend,
            Arc::clone(&store),
            Arc::clone(&monitor),
            tracker,
            self.identity,
            self.config.clone(),
        );

        DataLayer {
            store,
            monitor,
            engine,
            pipeline,
            config: self.config,
        }
    }
}

/// Entity lists, lookups, writes and connection health in one place.
///
/// Reads are served from the in-memory store and never wait on the network.
/// Writes are optimistic: their effect is visible immediately and rolled
/// back if the backend refuses them.
pub struct DataLayer<B: Backend> {
    store: Arc<Store>,
    monitor: Arc<ConnectionMonitor>,
    engine: SyncEngine<B>,
    pipeline: MutationPipeline<B>,
    config: DataConfig,
}

impl<B: Backend> DataLayer<B> {
    /// Starts building a data layer over `backend`.
    pub fn builder(backend: B) -> DataLayerBuilder<B> {
        DataLayerBuilder {
            backend,
            identity: Arc::new(StaticIdentity::anonymous()),
            persistence: None,
            config: DataConfig::default(),
        }
    }

    /// Loads the persisted snapshot, then fetches everything.
    pub async fn boot(&self) -> FetchReport {
        match self.engine.hydrate() {
            Ok(0) => {}
            Ok(records) => debug!(records, "serving snapshot until the first fetch lands"),
            Err(error) => warn!(%error, "could not hydrate from snapshot"),
        }
        self.engine.fetch_all().await
    }

    /// Fetches every kind.
    pub async fn fetch_all(&self) -> FetchReport {
        self.engine.fetch_all().await
    }

    /// Fetches one kind.
    pub async fn refresh(&self, kind: EntityKind) -> FetchReport {
        self.engine.refresh(kind).await
    }

    /// Runs `fetch_all` every `refresh_interval` until the layer is dropped.
    ///
    /// Returns `None` when no interval is configured.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let period = self.config.refresh_interval?;
        let layer = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(layer) = layer.upgrade() else {
                    break;
                };
                let report = layer.fetch_all().await;
                debug!(generation = report.generation, "scheduled refresh finished");
            }
        }))
    }

    /// Read-only handle for presentation code.
    pub fn view(&self) -> StoreView {
        StoreView::new(Arc::clone(&self.store))
    }

    /// Runs `f` against the relational resolver.
    pub fn with_resolver<R>(&self, f: impl FnOnce(RelationalResolver<'_>) -> R) -> R {
        let store = self.store.read();
        f(store.resolver())
    }

    /// Subscribes to store changes matching `interest`.
    pub fn subscribe(&self, interest: Interest) -> Receiver<ChangeEvent> {
        self.store.subscribe(interest)
    }

    /// Subscribes to connection health.
    pub fn subscribe_status(&self) -> watch::Receiver<MonitorSnapshot> {
        self.monitor.subscribe()
    }

    /// Returns true while a fetch is running.
    pub fn loading(&self) -> bool {
        self.monitor.loading()
    }

    /// Most recent fetch or mutation error.
    pub fn error(&self) -> Option<DataError> {
        self.monitor.error()
    }

    /// Overall connection status.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.monitor.status()
    }

    /// Full connection health.
    pub fn health(&self) -> MonitorSnapshot {
        self.monitor.snapshot()
    }

    /// Fetch statistics.
    pub fn stats(&self) -> SyncStats {
        self.engine.stats()
    }

    /// Every entity of type `T`.
    pub fn list<T: Entity>(&self) -> Vec<T> {
        self.store.read().list_all::<T>().to_vec()
    }

    /// Entity of type `T` by id.
    pub fn get_by_id<T: Entity>(&self, id: &str) -> Option<T> {
        self.store.read().get_by_id::<T>(id).cloned()
    }

    /// Entity of type `T` by slug.
    pub fn get_by_slug<T: Entity>(&self, slug: &str) -> Option<T> {
        self.store.read().get_by_slug::<T>(slug).cloned()
    }

    /// Creates an entity of type `T`.
    pub async fn add<T: Entity>(&self, draft: T::Draft) -> DataResult<T> {
        self.pipeline.add::<T>(draft).await
    }

    /// Patches an entity of type `T`.
    pub async fn update<T: Entity>(&self, id: &str, patch: T::Patch) -> DataResult<T> {
        self.pipeline.update::<T>(id, patch).await
    }

    /// Deletes an entity of type `T`.
    pub async fn delete<T: Entity>(&self, id: &str) -> DataResult<T> {
        self.pipeline.remove::<T>(id).await
    }

    /// Approves a pending entity of type `T`.
    pub async fn approve<T: Entity>(&self, id: &str) -> DataResult<T> {
        self.pipeline.approve::<T>(id).await
    }

    /// Rejects a pending entity of type `T`.
    pub async fn reject<T: Entity>(&self, id: &str) -> DataResult<T> {
        self.pipeline.reject::<T>(id).await
    }
}

macro_rules! typed_accessors {
    ($(
        $entity:ident, $draft:ident, $patch:ident, $noun:literal =>
            $list:ident, $by_id:ident, $by_slug:ident,
            $add:ident, $update:ident, $delete:ident, $approve:ident, $reject:ident;
    )*) => {
        impl<B: Backend> DataLayer<B> {
            $(
                #[doc = concat!("Every ", $noun, ".")]
                pub fn $list(&self) -> Vec<$entity> {
                    self.list::<$entity>()
                }

                #[doc = concat!("The ", $noun, " with this id.")]
                pub fn $by_id(&self, id: &str) -> Option<$entity> {
                    self.get_by_id::<$entity>(id)
                }

                #[doc = concat!("The ", $noun, " with this slug.")]
                pub fn $by_slug(&self, slug: &str) -> Option<$entity> {
                    self.get_by_slug::<$entity>(slug)
                }

                #[doc = concat!("Creates a pending ", $noun, ".")]
                pub async fn $add(&self, draft: $draft) -> DataResult<$entity> {
                    self.add::<$entity>(draft).await
                }

                #[doc = concat!("Patches a ", $noun, ".")]
                pub async fn $update(&self, id: &str, patch: $patch) -> DataResult<$entity> {
                    self.update::<$entity>(id, patch).await
                }

                #[doc = concat!("Deletes a ", $noun, ".")]
                pub async fn $delete(&self, id: &str) -> DataResult<$entity> {
                    self.delete::<$entity>(id).await
                }

                #[doc = concat!("Approves a pending ", $noun, ".")]
                pub async fn $approve(&self, id: &str) -> DataResult<$entity> {
                    self.approve::<$entity>(id).await
                }

                #[doc = concat!("Rejects a pending ", $noun, ".")]
                pub async fn $reject(&self, id: &str) -> DataResult<$entity> {
                    self.reject::<$entity>(id).await
                }
            )*
        }
    };
}

typed_accessors! {
    Event, EventDraft, EventPatch, "event" =>
        events, get_event_by_id, get_event_by_slug,
        add_event, update_event, delete_event, approve_event, reject_event;
    Dj, DjDraft, DjPatch, "DJ" =>
        djs, get_dj_by_id, get_dj_by_slug,
        add_dj, update_dj, delete_dj, approve_dj, reject_dj;
    Club, ClubDraft, ClubPatch, "club" =>
        clubs, get_club_by_id, get_club_by_slug,
        add_club, update_club, delete_club, approve_club, reject_club;
    Promoter, PromoterDraft, PromoterPatch, "promoter" =>
        promoters, get_promoter_by_id, get_promoter_by_slug,
        add_promoter, update_promoter, delete_promoter, approve_promoter, reject_promoter;
}

impl<B: Backend> std::fmt::Debug for DataLayer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLayer")
            .field("store", &self.store)
            .field("status", &self.monitor.status())
            .finish_non_exhaustive()
    }
}
