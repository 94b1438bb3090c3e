//! CLI command implementations.

pub mod export;
pub mod inspect;
pub mod verify;

use clap::ValueEnum;
use nightlife_core::{EntityKind, StoreSnapshot};
use nightlife_sync::{DataError, FileSnapshotStore, SnapshotStore};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Nothing saved at the given path.
    #[error("no snapshot found at {}", .0.display())]
    MissingSnapshot(PathBuf),

    /// The snapshot could not be read.
    #[error(transparent)]
    Data(#[from] DataError),

    /// JSON output failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Verification found problems.
    #[error("verification failed with {0} problem(s)")]
    VerificationFailed(usize),
}

/// Entity kind as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Events.
    Event,
    /// DJs.
    Dj,
    /// Clubs.
    Club,
    /// Promoters.
    Promoter,
}

impl From<KindArg> for EntityKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Event => EntityKind::Event,
            KindArg::Dj => EntityKind::Dj,
            KindArg::Club => EntityKind::Club,
            KindArg::Promoter => EntityKind::Promoter,
        }
    }
}

/// Reads the snapshot at `path`.
pub fn load_snapshot(path: &Path) -> Result<StoreSnapshot, CliError> {
    let snapshot = FileSnapshotStore::new(path)
        .load()?
        .ok_or_else(|| CliError::MissingSnapshot(path.to_path_buf()))?;
    debug!(path = %path.display(), records = snapshot.total(), "loaded snapshot");
    Ok(snapshot)
}
