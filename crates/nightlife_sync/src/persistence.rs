//! Local persistence of store snapshots.
//!
//! A snapshot lets the directory come up with the last known data before
//! the first network fetch completes.

use crate::error::{DataError, DataResult};
use nightlife_core::StoreSnapshot;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Where snapshots are kept.
pub trait SnapshotStore: Send + Sync {
    /// The last saved snapshot, if any.
    fn load(&self) -> DataResult<Option<StoreSnapshot>>;

    /// Replaces the saved snapshot.
    fn save(&self, snapshot: &StoreSnapshot) -> DataResult<()>;
}

/// Keeps the snapshot in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<StoreSnapshot>>,
    saves: Mutex<usize>,
}

impl MemorySnapshotStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `snapshot`.
    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> DataResult<Option<StoreSnapshot>> {
        Ok(self.snapshot.lock().clone())
    }

    fn save(&self, snapshot: &StoreSnapshot) -> DataResult<()> {
        *self.snapshot.lock() = Some(snapshot.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}

/// Keeps the snapshot in a CBOR file.
///
/// Saves write a sibling temp file and rename it over the target, so a
/// crash mid-save leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Uses the file at `path`. Parent directories are created on save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> DataResult<Option<StoreSnapshot>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&self.path, err)),
        };
        if file.metadata().map(|m| m.len()).unwrap_or(0) == 0 {
            return Ok(None);
        }
        let snapshot = ciborium::from_reader(BufReader::new(file)).map_err(|err| {
            DataError::persistence(format!("{}: corrupt snapshot: {err}", self.path.display()))
        })?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &StoreSnapshot) -> DataResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| io_error(parent, err))?;
        }

        let temp_path = self.temp_path();
        let file = File::create(&temp_path).map_err(|err| io_error(&temp_path, err))?;
        let mut writer = BufWriter::new(file);
        ciborium::into_writer(snapshot, &mut writer).map_err(|err| {
            DataError::persistence(format!("{}: encode failed: {err}", temp_path.display()))
        })?;
        writer.flush().map_err(|err| io_error(&temp_path, err))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|err| io_error(&temp_path, err))?;
        drop(writer);

        fs::rename(&temp_path, &self.path).map_err(|err| io_error(&self.path, err))?;
        tracing::debug!(path = %self.path.display(), records = snapshot.total(), "snapshot saved");
        Ok(())
    }
}

fn io_error(path: &Path, err: std::io::Error) -> DataError {
    DataError::persistence(format!("{}: {err}", path.display()))
}
