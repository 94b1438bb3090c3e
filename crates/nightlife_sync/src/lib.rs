//! # Nightlife Sync
//!
//! Keeps the nightlife directory's local store in step with a remote backend.
//!
//! This crate provides:
//! - A [`Backend`] abstraction and an in-memory implementation for tests and demos
//! - A [`SyncEngine`] that fetches every entity kind with retry and discards stale results
//! - A [`MutationPipeline`] applying optimistic writes with rollback on failure
//! - A [`ConnectionMonitor`] exposing loading, error and per-channel health
//! - Snapshot persistence so a cold start can serve the last known catalogue
//! - A [`DataLayer`] facade bundling all of the above
//!
//! ## Example
//!
//! ```rust,ignore
//! use nightlife_sync::{DataLayer, MemoryBackend};
//!
//! let data = DataLayer::builder(MemoryBackend::new()).build();
//! data.boot().await;
//! for event in data.events() {
//!     println!("{}", event.title);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod data;
mod engine;
mod error;
mod identity;
mod memory_backend;
mod monitor;
mod mutation;
mod persistence;
mod queue;
mod reservation;
mod retry;
mod tracker;

pub use backend::{Backend, BackendOp, Document};
pub use config::{DataConfig, RetryConfig};
pub use data::{DataLayer, DataLayerBuilder};
pub use engine::{FetchReport, KindOutcome, SyncEngine, SyncStats};
pub use error::{DataError, DataResult, ErrorKind};
pub use identity::{Identity, IdentityProvider, StaticIdentity};
pub use memory_backend::MemoryBackend;
pub use monitor::{ChannelHealth, ConnectionMonitor, ConnectionStatus, MonitorSnapshot};
pub use mutation::{Inverse, MutationPipeline, Transaction};
pub use persistence::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use tracker::{WriteGuard, WriteTracker};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
