//! Core type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock timestamp used for `createdAt` / `updatedAt`.
pub type Timestamp = DateTime<Utc>;

/// Returns the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// The four entity types managed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A dated nightlife event.
    Event,
    /// A DJ profile.
    Dj,
    /// A club / venue.
    Club,
    /// A promoter.
    Promoter,
}

impl EntityKind {
    /// Every kind, in fetch order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Event,
        EntityKind::Dj,
        EntityKind::Club,
        EntityKind::Promoter,
    ];

    /// Name of the backend collection holding this kind.
    pub const fn collection(self) -> &'static str {
        match self {
            EntityKind::Event => "events",
            EntityKind::Dj => "djs",
            EntityKind::Club => "clubs",
            EntityKind::Promoter => "promoters",
        }
    }

    /// Singular lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Event => "event",
            EntityKind::Dj => "dj",
            EntityKind::Club => "club",
            EntityKind::Promoter => "promoter",
        }
    }

    /// Parses either the singular or the collection name.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name || kind.collection() == name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation status of an entity.
///
/// Entities start `Pending`; `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Awaiting moderation.
    #[default]
    #[serde(alias = "PENDING", alias = "Pending")]
    Pending,
    /// Visible to the public.
    #[serde(alias = "APPROVED", alias = "Approved")]
    Approved,
    /// Refused by a moderator.
    #[serde(alias = "REJECTED", alias = "Rejected")]
    Rejected,
}

impl Status {
    /// Returns true if moderation may move this status to `target`.
    pub fn can_transition_to(self, target: Status) -> bool {
        matches!(
            (self, target),
            (Status::Pending, Status::Approved) | (Status::Pending, Status::Rejected)
        )
    }

    /// Returns true for `Approved` and `Rejected`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Pending)
    }

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
