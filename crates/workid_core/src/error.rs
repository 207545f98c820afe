//! Error types for Work-ID core.

use chrono::{DateTime, Utc};
use thiserror::Error;
use workid_storage::StorageError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Input that violates a record invariant. Never retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `title` is missing or blank.
    #[error("title is required")]
    MissingTitle,

    /// `creator_id` is missing or blank.
    #[error("creator_id is required")]
    MissingCreator,

    /// `time_end` precedes `time_start`.
    #[error("time_end {end} is before time_start {start}")]
    TimeRangeInverted {
        /// Start of the range.
        start: DateTime<Utc>,
        /// End of the range.
        end: DateTime<Utc>,
    },

    /// A meta field received a scalar where a list is declared, or vice versa.
    #[error("meta field `{field}` expects {expected}")]
    MetaArity {
        /// The field identifier.
        field: String,
        /// Either "a single value" or "a list of values".
        expected: &'static str,
    },

    /// A client-supplied id is not usable as a key.
    #[error("invalid id `{0}`: must be 1-128 characters without whitespace or ':'")]
    InvalidId(String),

    /// A timestamp could not be parsed.
    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),

    /// A field in a JSON document has the wrong type.
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        /// The field name.
        field: String,
        /// Description of the accepted type.
        expected: &'static str,
    },

    /// Pagination parameters are out of range.
    #[error("invalid page {page} with per_page {per_page}: both must be at least 1")]
    InvalidPage {
        /// Requested page (1-based).
        page: usize,
        /// Requested page size.
        per_page: usize,
    },
}

/// Coarse classification of a [`CoreError`] for callers that map errors
/// onto a transport (HTTP status, exit code, retry policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request is malformed; fix it before retrying.
    BadInput,
    /// The addressed record does not exist.
    NotFound,
    /// The request collides with existing or concurrently changed state.
    Conflict,
    /// The caller does not own the record.
    Forbidden,
    /// The backing store is unreachable; the request may be retried.
    Unavailable,
    /// Persisted data is unusable or an internal limit was hit.
    Internal,
}

/// Errors that can occur in Work-ID core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed validation; nothing was written.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A record with this id already exists, or an optimistic version check failed.
    #[error("conflict on record {id}")]
    Conflict {
        /// The contested record id.
        id: String,
    },

    /// No live record has this id.
    #[error("record not found: {id}")]
    NotFound {
        /// The requested id.
        id: String,
    },

    /// The acting identity does not own the record.
    #[error("{actor} is not allowed to modify record {id}")]
    Unauthorized {
        /// The record id.
        id: String,
        /// The identity that attempted the change.
        actor: String,
    },

    /// Backing store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A persisted payload cannot be decoded.
    #[error("corrupted data at {key}: {message}")]
    Corrupted {
        /// The key holding the bad payload.
        key: String,
        /// Decoder message.
        message: String,
    },

    /// No unused id was found within the retry budget.
    #[error("id space exhausted after {attempts} attempts")]
    IdSpaceExhausted {
        /// Number of candidates tried.
        attempts: u32,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a conflict error.
    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict { id: id.into() }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(id: impl Into<String>, actor: impl Into<String>) -> Self {
        Self::Unauthorized {
            id: id.into(),
            actor: actor.into(),
        }
    }

    /// Creates a corrupted-data error.
    pub fn corrupted(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Config(_) => ErrorKind::BadInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unauthorized { .. } => ErrorKind::Forbidden,
            Self::Storage(
                StorageError::Io(_) | StorageError::Unavailable(_) | StorageError::Locked,
            ) => ErrorKind::Unavailable,
            Self::Storage(_) | Self::Corrupted { .. } | Self::IdSpaceExhausted { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns true if the same request may succeed when retried unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_split_input_missing_and_trouble() {
        assert_eq!(
            CoreError::from(ValidationError::MissingTitle).kind(),
            ErrorKind::BadInput
        );
        assert_eq!(CoreError::not_found("AB").kind(), ErrorKind::NotFound);
        assert_eq!(
            CoreError::unauthorized("AB", "eve").kind(),
            ErrorKind::Forbidden
        );

        let unreachable = CoreError::from(StorageError::unavailable("connection refused"));
        assert_eq!(unreachable.kind(), ErrorKind::Unavailable);
        assert!(unreachable.is_retryable());

        let corrupted = CoreError::from(StorageError::corrupted("bad crc"));
        assert_eq!(corrupted.kind(), ErrorKind::Internal);
        assert!(!corrupted.is_retryable());
    }

    #[test]
    fn messages_name_the_record() {
        let err = CoreError::unauthorized("AB12", "eve@example.org");
        assert_eq!(
            err.to_string(),
            "eve@example.org is not allowed to modify record AB12"
        );
    }
}
