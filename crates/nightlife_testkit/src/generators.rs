//! Property-based test generators using proptest.
//!
//! Names and slugs are drawn from small pools so that generated sequences
//! collide often enough to exercise the uniqueness checks.

use nightlife_core::{ClubDraft, DjDraft, EntityKind, EventDraft, PromoterDraft};
use proptest::prelude::*;

const SLUG_POOL: [&str; 6] = [
    "tresor",
    "about-blank",
    "sisyphos",
    "griessmuehle",
    "renate",
    "oha",
];

/// Strategy for display names; slugify to a well-formed slug.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{2,9}( [A-Z][a-z]{1,8})?").expect("Invalid regex")
}

/// Strategy for slugs from a small, collision-prone pool.
pub fn slug_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(SLUG_POOL.to_vec()).prop_map(str::to_string)
}

/// Strategy for any entity kind.
pub fn kind_strategy() -> impl Strategy<Value = EntityKind> {
    prop::sample::select(EntityKind::ALL.to_vec())
}

/// Strategy for club drafts, with an explicit slug half of the time.
pub fn club_draft_strategy() -> impl Strategy<Value = ClubDraft> {
    (name_strategy(), prop::option::of(slug_strategy())).prop_map(|(name, slug)| ClubDraft {
        slug,
        ..ClubDraft::new(name)
    })
}

/// Strategy for DJ drafts.
pub fn dj_draft_strategy() -> impl Strategy<Value = DjDraft> {
    (name_strategy(), prop::option::of(slug_strategy())).prop_map(|(name, slug)| DjDraft {
        slug,
        ..DjDraft::new(name)
    })
}

/// Strategy for promoter drafts.
pub fn promoter_draft_strategy() -> impl Strategy<Value = PromoterDraft> {
    (name_strategy(), prop::option::of(slug_strategy())).prop_map(|(name, slug)| {
        PromoterDraft {
            slug,
            ..PromoterDraft::new(name)
        }
    })
}

/// Strategy for event drafts without references.
pub fn event_draft_strategy() -> impl Strategy<Value = EventDraft> {
    (name_strategy(), prop::option::of(slug_strategy())).prop_map(|(title, slug)| EventDraft {
        slug,
        ..EventDraft::new(title)
    })
}

/// A step in a generated sequence of club writes.
#[derive(Debug, Clone)]
pub enum ClubOperation {
    /// Create a club.
    Create {
        /// Creation input.
        draft: ClubDraft,
    },
    /// Change the slug of an existing club.
    Reslug {
        /// Index into the clubs created so far, modulo their count.
        target: usize,
        /// New slug.
        slug: String,
    },
    /// Delete an existing club.
    Delete {
        /// Index into the clubs created so far, modulo their count.
        target: usize,
    },
}

/// Strategy for a single club operation.
pub fn club_operation_strategy() -> impl Strategy<Value = ClubOperation> {
    prop_oneof![
        3 => club_draft_strategy().prop_map(|draft| ClubOperation::Create { draft }),
        2 => (any::<usize>(), slug_strategy())
            .prop_map(|(target, slug)| ClubOperation::Reslug { target, slug }),
        1 => any::<usize>().prop_map(|target| ClubOperation::Delete { target }),
    ]
}

/// Strategy for a sequence of club operations.
pub fn club_operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<ClubOperation>> {
    prop::collection::vec(club_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightlife_core::{slugify, validate_slug};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn names_slugify_cleanly(name in name_strategy()) {
            prop_assert!(validate_slug(&slugify(&name)).is_ok());
        }

        #[test]
        fn pool_slugs_are_valid(slug in slug_strategy()) {
            prop_assert!(validate_slug(&slug).is_ok());
        }

        #[test]
        fn club_drafts_keep_name(draft in club_draft_strategy()) {
            prop_assert!(!draft.name.is_empty());
        }
    }
}
