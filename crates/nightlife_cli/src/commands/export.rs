//! Export command implementation.

use super::{load_snapshot, CliError};
use nightlife_core::{EntityKind, StoreSnapshot};
use serde_json::Value;
use std::path::Path;

/// Runs the export command.
pub fn run(path: &Path, kind: Option<EntityKind>) -> Result<(), CliError> {
    let snapshot = load_snapshot(path)?;
    let value = export(&snapshot, kind)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// The whole snapshot, or the records of one kind as an array.
pub fn export(snapshot: &StoreSnapshot, kind: Option<EntityKind>) -> Result<Value, CliError> {
    let value = match kind {
        None => serde_json::to_value(snapshot)?,
        Some(EntityKind::Event) => serde_json::to_value(&snapshot.events)?,
        Some(EntityKind::Dj) => serde_json::to_value(&snapshot.djs)?,
        Some(EntityKind::Club) => serde_json::to_value(&snapshot.clubs)?,
        Some(EntityKind::Promoter) => serde_json::to_value(&snapshot.promoters)?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightlife_testkit::Catalogue;

    #[test]
    fn exports_one_kind_as_array() {
        let snapshot = Catalogue::sample().into_store().snapshot();
        let value = export(&snapshot, Some(EntityKind::Club)).unwrap();

        let clubs = value.as_array().unwrap();
        assert_eq!(clubs.len(), 2);
        assert_eq!(clubs[0]["slug"], "tresor");
        assert_eq!(clubs[0]["status"], "approved");
    }

    #[test]
    fn exports_everything() {
        let snapshot = Catalogue::sample().into_store().snapshot();
        let value = export(&snapshot, None).unwrap();

        assert_eq!(value["events"].as_array().unwrap().len(), 3);
        assert!(value.get("takenAt").is_some());
    }
}
