//! Connection health.
//!
//! Every fetch reports into the monitor channel by channel (one channel per
//! entity kind). The overall status is derived from the channels:
//!
//! - `Loading` while any fetch is running
//! - `Error` if any channel's last fetch failed
//! - `Connected` once one full fetch has succeeded for every channel
//! - `Idle` otherwise
//!
//! Mutation failures are remembered as the last error but never move the
//! status; only fetches do. The last error is cleared once every channel is
//! current again.

use crate::error::DataError;
use nightlife_core::{now, EntityKind, Timestamp};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::watch;

/// Overall or per-channel connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Nothing fetched yet.
    #[default]
    Idle,
    /// A fetch is running.
    Loading,
    /// Data is current.
    Connected,
    /// The last fetch failed after retries.
    Error,
}

impl ConnectionStatus {
    /// Returns true while a fetch is running.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionStatus::Loading)
    }

    /// Returns true if a manual or scheduled retry makes sense.
    pub fn can_retry(&self) -> bool {
        matches!(self, ConnectionStatus::Idle | ConnectionStatus::Error)
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Loading => "loading",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of one entity kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelHealth {
    /// Channel state.
    pub status: ConnectionStatus,
    /// The cached data for this kind is older than the last attempt.
    pub stale: bool,
    /// Error of the last failed fetch, cleared on success.
    pub last_error: Option<DataError>,
    /// Retries spent since the last success.
    pub retry_count: u32,
    /// When this kind was last fetched successfully.
    pub last_success: Option<Timestamp>,
}

/// Everything the monitor knows, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitorSnapshot {
    /// Overall status.
    pub status: ConnectionStatus,
    /// Per-kind health.
    pub channels: BTreeMap<EntityKind, ChannelHealth>,
    /// Most recent fetch or mutation error.
    pub last_error: Option<DataError>,
    /// Retries spent since the data was last fully current.
    pub retry_count: u32,
    /// Fetches currently running.
    pub active_fetches: usize,
    /// Whether a full fetch has ever succeeded for every channel.
    pub ever_connected: bool,
}

impl MonitorSnapshot {
    /// Returns true while any fetch is running.
    pub fn loading(&self) -> bool {
        self.active_fetches > 0
    }

    /// Most recent error.
    pub fn error(&self) -> Option<&DataError> {
        self.last_error.as_ref()
    }

    /// Health of one kind.
    pub fn channel(&self, kind: EntityKind) -> ChannelHealth {
        self.channels.get(&kind).cloned().unwrap_or_default()
    }

    /// Kinds whose last fetch failed.
    pub fn failed_channels(&self) -> Vec<EntityKind> {
        self.channels
            .iter()
            .filter(|(_, health)| health.status == ConnectionStatus::Error)
            .map(|(kind, _)| *kind)
            .collect()
    }

    fn all_connected(&self) -> bool {
        EntityKind::ALL.iter().all(|kind| {
            self.channels
                .get(kind)
                .is_some_and(|health| health.status == ConnectionStatus::Connected)
        })
    }

    fn recompute(&mut self) {
        self.status = if self.active_fetches > 0 {
            ConnectionStatus::Loading
        } else if self
            .channels
            .values()
            .any(|health| health.status == ConnectionStatus::Error)
        {
            ConnectionStatus::Error
        } else if self.ever_connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Idle
        };
    }
}

/// Aggregates fetch and mutation outcomes into an observable status.
#[derive(Debug)]
pub struct ConnectionMonitor {
    state: watch::Sender<MonitorSnapshot>,
}

impl ConnectionMonitor {
    /// Creates an idle monitor.
    pub fn new() -> Self {
        let (state, _) = watch::channel(MonitorSnapshot::default());
        Self { state }
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.state.subscribe()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.state.borrow().clone()
    }

    /// Overall status.
    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().status
    }

    /// Returns true while any fetch is running.
    pub fn loading(&self) -> bool {
        self.state.borrow().loading()
    }

    /// Most recent error.
    pub fn error(&self) -> Option<DataError> {
        self.state.borrow().last_error.clone()
    }

    /// Retries spent since the data was last fully current.
    pub fn retry_count(&self) -> u32 {
        self.state.borrow().retry_count
    }

    /// A fetch covering `kinds` has started.
    pub fn fetch_started(&self, kinds: &[EntityKind]) {
        self.update(|state| {
            state.active_fetches += 1;
            for kind in kinds {
                state.channels.entry(*kind).or_default().status = ConnectionStatus::Loading;
            }
        });
    }

    /// A fetch has finished, whatever its outcome.
    pub fn fetch_finished(&self) {
        self.update(|state| {
            state.active_fetches = state.active_fetches.saturating_sub(1);
        });
    }

    /// `kind` is about to be retried.
    pub fn record_retry(&self, kind: EntityKind, error: &DataError) {
        self.update(|state| {
            let channel = state.channels.entry(kind).or_default();
            channel.retry_count += 1;
            channel.last_error = Some(error.clone());
            state.retry_count += 1;
        });
    }

    /// `kind` was fetched successfully.
    pub fn record_success(&self, kind: EntityKind) {
        self.update(|state| {
            let channel = state.channels.entry(kind).or_default();
            channel.status = ConnectionStatus::Connected;
            channel.stale = false;
            channel.last_error = None;
            channel.retry_count = 0;
            channel.last_success = Some(now());
            if state.all_connected() {
                state.last_error = None;
                state.retry_count = 0;
            }
        });
    }

    /// A fetch of every kind succeeded.
    pub fn record_full_sync(&self) {
        self.update(|state| {
            state.ever_connected = true;
            state.last_error = None;
            state.retry_count = 0;
        });
    }

    /// `kind` failed after retries; its cached data is now stale.
    pub fn record_failure(&self, kind: EntityKind, error: &DataError) {
        self.update(|state| {
            let channel = state.channels.entry(kind).or_default();
            channel.status = ConnectionStatus::Error;
            channel.stale = true;
            channel.last_error = Some(error.clone());
            state.last_error = Some(error.clone());
        });
    }

    /// A mutation failed. Remembered, but the status is left alone.
    pub fn record_mutation_failure(&self, error: &DataError) {
        self.update(|state| state.last_error = Some(error.clone()));
    }

    fn update(&self, f: impl FnOnce(&mut MonitorSnapshot)) {
        self.state.send_modify(|state| {
            f(state);
            state.recompute();
        });
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}
