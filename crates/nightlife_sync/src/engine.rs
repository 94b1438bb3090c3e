//! Fetching collections from the backend into the store.
//!
//! Each fetch is stamped with a generation. Kinds are fetched independently
//! and concurrently; a kind that fails keeps its previous collection. A
//! result is discarded when a newer fetch of the same kind has already been
//! applied, or when a local write of that kind is in flight or finished
//! after the fetch started.
//!
//! Concurrent calls for the same scope share one network operation.

use crate::backend::Backend;
use crate::config::DataConfig;
use crate::error::{DataError, DataResult};
use crate::monitor::ConnectionMonitor;
use crate::persistence::SnapshotStore;
use crate::retry::with_retry;
use crate::tracker::WriteTracker;
use nightlife_core::{now, Club, Dj, Entity, EntityKind, Event, Promoter, Store, Timestamp};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What one fetch did for one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum KindOutcome {
    /// The fetched collection replaced the cached one.
    Applied {
        /// Records now in the store.
        count: usize,
        /// Records dropped as undecodable or duplicate.
        skipped: usize,
    },
    /// The fetch succeeded but newer data was already in the store.
    Superseded,
    /// The fetch failed after retries; the cached collection is untouched.
    Failed {
        /// Final error.
        error: DataError,
        /// Attempts made.
        attempts: u32,
    },
}

impl KindOutcome {
    /// Returns true if the backend answered.
    pub fn is_success(&self) -> bool {
        !matches!(self, KindOutcome::Failed { .. })
    }
}

/// Result of one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    /// Generation the fetch ran under.
    pub generation: u64,
    /// Outcome per fetched kind.
    pub outcomes: BTreeMap<EntityKind, KindOutcome>,
}

impl FetchReport {
    /// Outcome for `kind`, if it was part of this fetch.
    pub fn outcome(&self, kind: EntityKind) -> Option<&KindOutcome> {
        self.outcomes.get(&kind)
    }

    /// Returns true if every fetched kind answered.
    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(KindOutcome::is_success)
    }

    /// Kinds whose fetch failed.
    pub fn failed(&self) -> Vec<EntityKind> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Returns true if any kind replaced its cached collection.
    pub fn applied_any(&self) -> bool {
        self.outcomes
            .values()
            .any(|outcome| matches!(outcome, KindOutcome::Applied { .. }))
    }
}

/// Statistics about fetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    /// Fetches that went to the network.
    pub fetches_started: u64,
    /// Calls that joined a fetch already in flight.
    pub fetches_joined: u64,
    /// Kind results written to the store.
    pub kinds_applied: u64,
    /// Kind results discarded as stale.
    pub kinds_superseded: u64,
    /// Kind fetches that failed after retries.
    pub kinds_failed: u64,
    /// Retries spent.
    pub retries: u64,
    /// Records dropped while applying.
    pub records_skipped: u64,
    /// When the last fetch finished.
    pub last_fetch: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Scope {
    All,
    Kind(EntityKind),
}

impl Scope {
    fn kinds(self) -> Vec<EntityKind> {
        match self {
            Scope::All => EntityKind::ALL.to_vec(),
            Scope::Kind(kind) => vec![kind],
        }
    }
}

struct InFlight {
    generation: u64,
    report: watch::Receiver<Option<FetchReport>>,
}

type Slots = Mutex<HashMap<Scope, InFlight>>;

// Frees the in-flight slot even if the leading call is dropped mid-fetch.
struct SlotGuard<'a> {
    slots: &'a Slots,
    scope: Scope,
    generation: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        if slots
            .get(&self.scope)
            .is_some_and(|slot| slot.generation == self.generation)
        {
            slots.remove(&self.scope);
        }
    }
}

/// Populates and refreshes the store from a backend.
pub struct SyncEngine<B: Backend> {
    backend: Arc<B>,
    store: Arc<Store>,
    monitor: Arc<ConnectionMonitor>,
    tracker: Arc<WriteTracker>,
    persistence: Option<Arc<dyn SnapshotStore>>,
    config: DataConfig,
    in_flight: Slots,
    applied: Mutex<HashMap<EntityKind, u64>>,
    stats: Mutex<SyncStats>,
}

impl<B: Backend> SyncEngine<B> {
    /// Creates an engine writing into `store`.
    pub fn new(
        backend: Arc<B>,
        store: Arc<Store>,
        monitor: Arc<ConnectionMonitor>,
        tracker: Arc<WriteTracker>,
        config: DataConfig,
    ) -> Self {
        Self {
            backend,
            store,
            monitor,
            tracker,
            persistence: None,
            config,
            in_flight: Mutex::new(HashMap::new()),
            applied: Mutex::new(HashMap::new()),
            stats: Mutex::new(SyncStats::default()),
        }
    }

    /// Saves a snapshot after every fetch that applied data, and allows [`hydrate`](Self::hydrate).
    pub fn with_persistence(mut self, persistence: Arc<dyn SnapshotStore>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Fetch statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.lock().clone()
    }

    /// Whether a fetch of every kind is currently running.
    pub fn is_fetching(&self) -> bool {
        self.in_flight.lock().contains_key(&Scope::All)
    }

    /// Fetches every kind.
    ///
    /// Never fails: per-kind failures are reported in the outcome and to the
    /// monitor. Joins a fetch already in flight instead of starting another.
    pub async fn fetch_all(&self) -> FetchReport {
        self.fetch(Scope::All).await
    }

    /// Fetches one kind, with the same generation and discard rules.
    pub async fn refresh(&self, kind: EntityKind) -> FetchReport {
        self.fetch(Scope::Kind(kind)).await
    }

    /// Loads the persisted snapshot into kinds no fetch has filled yet.
    ///
    /// Returns the number of records loaded.
    pub fn hydrate(&self) -> DataResult<usize> {
        let Some(persistence) = &self.persistence else {
            return Ok(0);
        };
        let Some(snapshot) = persistence.load()? else {
            debug!("no snapshot to hydrate from");
            return Ok(0);
        };

        let loaded = self.store.write(|store| {
            let applied = self.applied.lock();
            let fresh = |kind: EntityKind| !applied.contains_key(&kind);
            let mut skipped = Vec::new();
            if fresh(EntityKind::Event) {
                skipped.extend(store.replace_all(snapshot.events));
            }
            if fresh(EntityKind::Dj) {
                skipped.extend(store.replace_all(snapshot.djs));
            }
            if fresh(EntityKind::Club) {
                skipped.extend(store.replace_all(snapshot.clubs));
            }
            if fresh(EntityKind::Promoter) {
                skipped.extend(store.replace_all(snapshot.promoters));
            }
            if !skipped.is_empty() {
                warn!(count = skipped.len(), "snapshot held conflicting records");
            }
            EntityKind::ALL
                .into_iter()
                .filter(|kind| fresh(*kind))
                .map(|kind| store.count(kind))
                .sum::<usize>()
        });
        info!(records = loaded, taken_at = %snapshot.taken_at, "hydrated from snapshot");
        Ok(loaded)
    }

    async fn fetch(&self, scope: Scope) -> FetchReport {
        loop {
            let turn = {
                let mut slots = self.in_flight.lock();
                match slots.get(&scope) {
                    Some(slot) => Err(slot.report.clone()),
                    None => {
                        let generation = self.tracker.tick();
                        let (tx, rx) = watch::channel(None);
                        slots.insert(
                            scope,
                            InFlight {
                                generation,
                                report: rx,
                            },
                        );
                        Ok((generation, tx))
                    }
                }
            };

            match turn {
                Ok((generation, tx)) => {
                    let _slot = SlotGuard {
                        slots: &self.in_flight,
                        scope,
                        generation,
                    };
                    let report = self.run(scope, generation).await;
                    tx.send_replace(Some(report.clone()));
                    return report;
                }
                Err(mut rx) => {
                    self.stats.lock().fetches_joined += 1;
                    debug!(?scope, "joining fetch in flight");
                    let joined = rx
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|report| (*report).clone());
                    if let Some(report) = joined {
                        return report;
                    }
                    // The leading call was dropped before finishing; start over.
                }
            }
        }
    }

    async fn run(&self, scope: Scope, generation: u64) -> FetchReport {
        let kinds = scope.kinds();
        self.stats.lock().fetches_started += 1;
        self.monitor.fetch_started(&kinds);
        debug!(generation, ?kinds, "fetch started");

        let mut outcomes = BTreeMap::new();
        match scope {
            Scope::All => {
                let (events, djs, clubs, promoters) = tokio::join!(
                    self.fetch_kind::<Event>(generation),
                    self.fetch_kind::<Dj>(generation),
                    self.fetch_kind::<Club>(generation),
                    self.fetch_kind::<Promoter>(generation),
                );
                outcomes.insert(EntityKind::Event, events);
                outcomes.insert(EntityKind::Dj, djs);
                outcomes.insert(EntityKind::Club, clubs);
                outcomes.insert(EntityKind::Promoter, promoters);
            }
            Scope::Kind(kind) => {
                let outcome = match kind {
                    EntityKind::Event => self.fetch_kind::<Event>(generation).await,
                    EntityKind::Dj => self.fetch_kind::<Dj>(generation).await,
                    EntityKind::Club => self.fetch_kind::<Club>(generation).await,
                    EntityKind::Promoter => self.fetch_kind::<Promoter>(generation).await,
                };
                outcomes.insert(kind, outcome);
            }
        }

        let report = FetchReport {
            generation,
            outcomes,
        };
        if report.applied_any() {
            self.persist();
        }
        if scope == Scope::All && report.is_success() {
            self.monitor.record_full_sync();
        }
        self.stats.lock().last_fetch = Some(now());
        self.monitor.fetch_finished();

        let failed = report.failed();
        if failed.is_empty() {
            info!(generation, "fetch complete");
        } else {
            info!(generation, ?failed, "fetch complete with failures");
        }
        report
    }

    async fn fetch_kind<T: Entity>(&self, generation: u64) -> KindOutcome {
        let kind = T::KIND;
        let (result, attempts) = with_retry(
            &self.config.sync_retry,
            self.config.request_timeout,
            || self.backend.list(kind),
            |attempt, error| {
                warn!(%kind, attempt, %error, "fetch failed, retrying");
                self.stats.lock().retries += 1;
                self.monitor.record_retry(kind, error);
            },
        )
        .await;

        let documents = match result {
            Ok(documents) => documents,
            Err(error) => {
                warn!(%kind, attempts, %error, "fetch failed, keeping cached data");
                self.stats.lock().kinds_failed += 1;
                self.monitor.record_failure(kind, &error);
                return KindOutcome::Failed { error, attempts };
            }
        };

        let mut records = Vec::with_capacity(documents.len());
        let mut undecodable = 0;
        for document in documents {
            match T::from_document(document) {
                Ok(record) => records.push(record),
                Err(error) => {
                    undecodable += 1;
                    warn!(%kind, %error, "skipping undecodable record");
                }
            }
        }

        let applied = self.store.write(|store| {
            if !self.tracker.is_clean_since(kind, generation) {
                return None;
            }
            let mut applied = self.applied.lock();
            if applied.get(&kind).is_some_and(|newest| *newest > generation) {
                return None;
            }
            applied.insert(kind, generation);
            let duplicates = store.replace_all(records).len();
            Some((store.count(kind), duplicates))
        });
        self.monitor.record_success(kind);

        let mut stats = self.stats.lock();
        match applied {
            Some((count, duplicates)) => {
                let skipped = undecodable + duplicates;
                stats.kinds_applied += 1;
                stats.records_skipped += skipped as u64;
                debug!(%kind, generation, count, skipped, "collection applied");
                KindOutcome::Applied { count, skipped }
            }
            None => {
                stats.kinds_superseded += 1;
                debug!(%kind, generation, "collection superseded, discarding");
                KindOutcome::Superseded
            }
        }
    }

    fn persist(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let snapshot = self.store.snapshot().without_temporary();
        if let Err(error) = persistence.save(&snapshot) {
            warn!(%error, "failed to save snapshot");
        }
    }
}

impl<B: Backend> std::fmt::Debug for SyncEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("store", &self.store)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendOp;
    use crate::config::RetryConfig;
    use crate::memory_backend::MemoryBackend;
    use crate::persistence::MemorySnapshotStore;
    use nightlife_core::{ClubDraft, Draft, DjDraft, EntityId};
    use serde_json::json;
    use std::time::Duration;

    fn config() -> DataConfig {
        DataConfig::new().with_sync_retry(
            RetryConfig::new(3)
                .with_initial_delay(Duration::from_millis(1))
                .with_jitter(false),
        )
    }

    struct Harness {
        backend: Arc<MemoryBackend>,
        store: Arc<Store>,
        monitor: Arc<ConnectionMonitor>,
        tracker: Arc<WriteTracker>,
        engine: Arc<SyncEngine<MemoryBackend>>,
    }

    fn harness() -> Harness {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(Store::new());
        let monitor = Arc::new(ConnectionMonitor::new());
        let tracker = Arc::new(WriteTracker::new());
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            Arc::clone(&monitor),
            Arc::clone(&tracker),
            config(),
        ));
        Harness {
            backend,
            store,
            monitor,
            tracker,
            engine,
        }
    }

    fn club(id: &str, name: &str) -> Club {
        ClubDraft::new(name).into_entity(id.into(), now())
    }

    #[tokio::test]
    async fn fetch_all_fills_every_kind() {
        let h = harness();
        h.backend.seed(&[club("c1", "Tresor"), club("c2", "Berghain")]).unwrap();
        h.backend
            .seed(&[DjDraft::new("Surgeon").into_entity("d1".into(), now())])
            .unwrap();

        let report = h.engine.fetch_all().await;

        assert!(report.is_success());
        assert_eq!(
            report.outcome(EntityKind::Club),
            Some(&KindOutcome::Applied { count: 2, skipped: 0 })
        );
        assert_eq!(h.store.read().count(EntityKind::Dj), 1);
        assert_eq!(h.monitor.status(), crate::monitor::ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn failed_kind_keeps_cached_collection() {
        let h = harness();
        h.backend.seed(&[club("c1", "Tresor")]).unwrap();
        h.engine.fetch_all().await;

        for _ in 0..3 {
            h.backend.fail_next(
                EntityKind::Club,
                BackendOp::List,
                DataError::network_retryable("reset"),
            );
        }
        let report = h.engine.fetch_all().await;

        assert_eq!(report.failed(), vec![EntityKind::Club]);
        assert!(matches!(
            report.outcome(EntityKind::Club),
            Some(KindOutcome::Failed { attempts: 3, .. })
        ));
        assert_eq!(h.store.read().count(EntityKind::Club), 1);
        assert_eq!(h.monitor.status(), crate::monitor::ConnectionStatus::Error);
        assert_eq!(h.engine.stats().retries, 2);
    }

    #[tokio::test]
    async fn transient_failure_recovers_within_budget() {
        let h = harness();
        h.backend.seed(&[club("c1", "Tresor")]).unwrap();
        h.backend.fail_next(
            EntityKind::Club,
            BackendOp::List,
            DataError::network_retryable("reset"),
        );

        let report = h.engine.fetch_all().await;
        assert!(report.is_success());
        assert_eq!(h.backend.calls(EntityKind::Club, BackendOp::List), 2);
    }

    #[tokio::test]
    async fn concurrent_fetches_share_one_request() {
        let h = harness();
        h.backend.set_latency(Duration::from_millis(20));

        let (first, second) = tokio::join!(h.engine.fetch_all(), h.engine.fetch_all());

        assert_eq!(first, second);
        assert_eq!(h.backend.total_calls(BackendOp::List), 4);
        assert_eq!(h.engine.stats().fetches_joined, 1);
        assert!(!h.engine.is_fetching());
    }

    #[tokio::test]
    async fn older_generation_is_discarded() {
        let h = harness();
        h.backend.seed(&[club("c1", "Tresor")]).unwrap();
        h.backend.set_op_latency(BackendOp::List, Duration::from_millis(50));

        let slow = tokio::spawn({
            let engine = Arc::clone(&h.engine);
            async move { engine.fetch_all().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        h.backend.set_op_latency(BackendOp::List, Duration::ZERO);
        h.backend.seed(&[club("c2", "Berghain")]).unwrap();
        let fast = h.engine.refresh(EntityKind::Club).await;
        assert_eq!(
            fast.outcome(EntityKind::Club),
            Some(&KindOutcome::Applied { count: 2, skipped: 0 })
        );

        let slow = slow.await.unwrap();
        assert!(slow.generation < fast.generation);
        assert_eq!(slow.outcome(EntityKind::Club), Some(&KindOutcome::Superseded));
        assert_eq!(h.store.read().count(EntityKind::Club), 2);
    }

    #[tokio::test]
    async fn in_flight_write_discards_fetch() {
        let h = harness();
        h.backend.seed(&[club("c1", "Tresor")]).unwrap();

        let guard = h.tracker.begin(EntityKind::Club);
        let report = h.engine.fetch_all().await;
        drop(guard);

        assert_eq!(report.outcome(EntityKind::Club), Some(&KindOutcome::Superseded));
        assert_eq!(h.store.read().count(EntityKind::Club), 0);
        assert!(matches!(
            report.outcome(EntityKind::Event),
            Some(KindOutcome::Applied { .. })
        ));
    }

    #[tokio::test]
    async fn undecodable_records_are_skipped() {
        let h = harness();
        h.backend.seed(&[club("c1", "Tresor")]).unwrap();
        h.backend.insert_raw(EntityKind::Club, json!({"id": "c2", "name": 42}));
        h.backend.insert_raw(EntityKind::Club, json!({"id": "c3", "slug": "tresor", "name": "Copy"}));

        let report = h.engine.refresh(EntityKind::Club).await;
        assert_eq!(
            report.outcome(EntityKind::Club),
            Some(&KindOutcome::Applied { count: 1, skipped: 2 })
        );
    }

    #[tokio::test]
    async fn applied_fetch_saves_snapshot_and_hydrates() {
        let h = harness();
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let engine = SyncEngine::new(
            Arc::clone(&h.backend),
            Arc::clone(&h.store),
            Arc::clone(&h.monitor),
            Arc::clone(&h.tracker),
            config(),
        )
        .with_persistence(snapshots.clone());
        h.backend.seed(&[club("c1", "Tresor")]).unwrap();

        engine.fetch_all().await;
        assert_eq!(snapshots.save_count(), 1);

        let store = Arc::new(Store::new());
        let cold = SyncEngine::new(
            Arc::clone(&h.backend),
            Arc::clone(&store),
            Arc::new(ConnectionMonitor::new()),
            Arc::new(WriteTracker::new()),
            config(),
        )
        .with_persistence(snapshots);
        assert_eq!(cold.hydrate().unwrap(), 1);
        assert!(store.read().get_by_slug::<Club>("tresor").is_some());
    }

    #[tokio::test]
    async fn unconfirmed_records_are_not_saved() {
        let h = harness();
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let engine = SyncEngine::new(
            Arc::clone(&h.backend),
            Arc::clone(&h.store),
            Arc::clone(&h.monitor),
            Arc::clone(&h.tracker),
            config(),
        )
        .with_persistence(snapshots.clone());
        h.backend
            .seed(&[DjDraft::new("Surgeon").into_entity("d1".into(), now())])
            .unwrap();
        // A create still waiting for the backend.
        let _write = h.tracker.begin(EntityKind::Club);
        h.store
            .write(|s| s.insert(club(EntityId::temporary().as_str(), "Ghost")))
            .unwrap();

        let report = engine.fetch_all().await;

        assert_eq!(report.outcome(EntityKind::Club), Some(&KindOutcome::Superseded));
        assert_eq!(h.store.read().count(EntityKind::Club), 1);
        let saved = snapshots.load().unwrap().unwrap();
        assert_eq!(saved.djs.len(), 1);
        assert!(saved.clubs.is_empty());
    }
}
