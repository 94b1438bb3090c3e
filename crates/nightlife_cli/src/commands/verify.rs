//! Verify command implementation.

use super::{load_snapshot, CliError};
use nightlife_core::{Club, Dj, Entity, EntityStore, Event, Promoter, StoreSnapshot};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of records checked.
    pub records_checked: usize,
    /// Records dropped on reload because their id or slug was taken.
    pub duplicates: Vec<String>,
    /// Records failing field validation.
    pub invalid: Vec<String>,
    /// References to records that are not in the snapshot.
    pub dangling: Vec<String>,
}

impl VerifyResult {
    /// Number of problems found.
    pub fn problems(&self) -> usize {
        self.duplicates.len() + self.invalid.len() + self.dangling.len()
    }

    fn is_ok(&self) -> bool {
        self.problems() == 0
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), CliError> {
    println!("Verifying snapshot at {:?}", path);
    println!();

    let snapshot = load_snapshot(path)?;
    let result = verify(snapshot);

    println!("Records checked: {}", result.records_checked);
    print_section("Duplicate ids or slugs", &result.duplicates);
    print_section("Invalid records", &result.invalid);
    print_section("Dangling references", &result.dangling);

    println!();
    if result.is_ok() {
        println!("✓ Snapshot verification passed");
        Ok(())
    } else {
        println!("✗ Snapshot verification failed");
        Err(CliError::VerificationFailed(result.problems()))
    }
}

/// Checks `snapshot` by reloading it into a store.
pub fn verify(snapshot: StoreSnapshot) -> VerifyResult {
    let mut result = VerifyResult {
        records_checked: snapshot.total(),
        ..VerifyResult::default()
    };

    let (store, skipped) = EntityStore::from_snapshot(snapshot);
    result.duplicates = skipped
        .into_iter()
        .map(|(kind, skipped)| format!("{kind} {}: {}", skipped.id, skipped.reason))
        .collect();

    check_fields(store.list_all::<Event>(), &mut result.invalid);
    check_fields(store.list_all::<Dj>(), &mut result.invalid);
    check_fields(store.list_all::<Club>(), &mut result.invalid);
    check_fields(store.list_all::<Promoter>(), &mut result.invalid);

    result.dangling = store
        .resolver()
        .dangling_references()
        .into_iter()
        .map(|d| format!("{} {} -> {}", d.owner_kind, d.owner_id, d.target))
        .collect();

    result
}

fn check_fields<T: Entity>(records: &[T], out: &mut Vec<String>) {
    for record in records {
        if let Err(err) = record.validate() {
            out.push(format!("{} {}: {err}", T::KIND, record.id()));
        }
    }
}

fn print_section(title: &str, lines: &[String]) {
    if lines.is_empty() {
        println!("{title}: none");
        return;
    }
    println!("{title}: {}", lines.len());
    for line in lines {
        println!("  - {line}");
    }
}
