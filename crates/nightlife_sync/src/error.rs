//! Error types for sync and mutations.

use nightlife_core::{CoreError, EntityKind};
use std::fmt;
use thiserror::Error;

/// Result type for data layer operations.
pub type DataResult<T> = Result<T, DataError>;

/// The five failure kinds every public operation can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transient I/O failure.
    Network,
    /// Malformed input.
    Validation,
    /// Referenced id does not exist.
    NotFound,
    /// Collides with current state.
    Conflict,
    /// Missing or insufficient identity.
    Unauthorized,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Network => "network",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthorized => "unauthorized",
        })
    }
}

/// Errors that can occur during sync or mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// Network or transport error.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind.
        kind: EntityKind,
        /// The missing id.
        id: String,
    },

    /// Slug collision or invalid moderation transition.
    #[error("conflict on {kind}: {message}")]
    Conflict {
        /// Entity kind.
        kind: EntityKind,
        /// Description of the conflict.
        message: String,
    },

    /// No valid identity for a restricted operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Snapshot load or save failed.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl DataError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
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

    /// Creates an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Creates a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// The taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::Network { .. } => ErrorKind::Network,
            DataError::Validation(_) => ErrorKind::Validation,
            DataError::NotFound { .. } => ErrorKind::NotFound,
            DataError::Conflict { .. } => ErrorKind::Conflict,
            DataError::Unauthorized(_) => ErrorKind::Unauthorized,
            // Local storage is I/O as far as callers are concerned.
            DataError::Persistence(_) => ErrorKind::Network,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DataError::Network { retryable: true, .. })
    }
}

impl From<CoreError> for DataError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => Self::Validation(message),
            CoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            CoreError::Conflict { kind, message } => Self::Conflict { kind, message },
            // A record we cannot decode is malformed input from our side of the wire.
            CoreError::Codec(message) => Self::Validation(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(DataError::network_retryable("connection reset").is_retryable());
        assert!(!DataError::network_fatal("tls handshake failed").is_retryable());
        assert!(!DataError::validation("title is required").is_retryable());
        assert!(!DataError::conflict(EntityKind::Dj, "not pending").is_retryable());
    }

    #[test]
    fn core_errors_map_to_kinds() {
        let err: DataError = CoreError::slug_taken(EntityKind::Club, "tresor").into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: DataError = CoreError::not_found(EntityKind::Event, "e1").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "event not found: e1");

        let err: DataError = CoreError::Codec("bad".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
