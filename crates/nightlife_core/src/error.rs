//! Error types for the nightlife core.

use crate::types::EntityKind;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the store and the data model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Input failed validation (missing field, malformed slug, bad reference).
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// The referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind that was searched.
        kind: EntityKind,
        /// The id that was not found.
        id: String,
    },

    /// The operation collides with current state (slug taken, not pending, ...).
    #[error("conflict on {kind}: {message}")]
    Conflict {
        /// Entity kind the conflict occurred in.
        kind: EntityKind,
        /// Description of the conflict.
        message: String,
    },

    /// A record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(kind: EntityKind, message: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            message: message.into(),
        }
    }

    /// Creates a slug collision error.
    pub fn slug_taken(kind: EntityKind, slug: &str) -> Self {
        Self::conflict(kind, format!("slug '{slug}' is already in use"))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
