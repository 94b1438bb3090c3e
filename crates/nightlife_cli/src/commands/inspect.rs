//! Inspect command implementation.

use super::{load_snapshot, CliError};
use nightlife_core::{Entity, EntityKind, Status, StoreSnapshot};
use serde::Serialize;
use std::path::Path;

/// Snapshot inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// When the snapshot was taken (RFC 3339).
    pub taken_at: String,
    /// Total number of records.
    pub total: usize,
    /// Per-kind statistics.
    pub kinds: Vec<KindStats>,
}

/// Counts for a single kind.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct KindStats {
    /// Entity kind.
    pub kind: String,
    /// Number of records.
    pub total: usize,
    /// Awaiting moderation.
    pub pending: usize,
    /// Approved.
    pub approved: usize,
    /// Rejected.
    pub rejected: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), CliError> {
    let snapshot = load_snapshot(path)?;
    let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let result = inspect(path, file_size, &snapshot);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Summarizes `snapshot`.
pub fn inspect(path: &Path, file_size: u64, snapshot: &StoreSnapshot) -> InspectResult {
    let kinds = EntityKind::ALL
        .into_iter()
        .map(|kind| match kind {
            EntityKind::Event => kind_stats(kind, &snapshot.events),
            EntityKind::Dj => kind_stats(kind, &snapshot.djs),
            EntityKind::Club => kind_stats(kind, &snapshot.clubs),
            EntityKind::Promoter => kind_stats(kind, &snapshot.promoters),
        })
        .collect();

    InspectResult {
        path: path.display().to_string(),
        file_size,
        taken_at: snapshot.taken_at.to_rfc3339(),
        total: snapshot.total(),
        kinds,
    }
}

fn kind_stats<T: Entity>(kind: EntityKind, records: &[T]) -> KindStats {
    let mut stats = KindStats {
        kind: kind.to_string(),
        total: records.len(),
        ..KindStats::default()
    };
    for record in records {
        match record.status() {
            Status::Pending => stats.pending += 1,
            Status::Approved => stats.approved += 1,
            Status::Rejected => stats.rejected += 1,
        }
    }
    stats
}

fn print_text_output(result: &InspectResult) {
    println!("Nightlife Snapshot Inspection");
    println!("=============================");
    println!();
    println!("Path:      {}", result.path);
    println!("Size:      {}", format_size(result.file_size));
    println!("Taken at:  {}", result.taken_at);
    println!();
    println!(
        "{:<10} {:>7} {:>8} {:>9} {:>9}",
        "Kind", "Total", "Pending", "Approved", "Rejected"
    );
    for stats in &result.kinds {
        println!(
            "{:<10} {:>7} {:>8} {:>9} {:>9}",
            stats.kind, stats.total, stats.pending, stats.approved, stats.rejected
        );
    }
    println!();
    println!("Total records: {}", result.total);
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
