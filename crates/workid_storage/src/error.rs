//! Error types for key-value backend operations.

use std::io;
use thiserror::Error;

/// Result type for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during backend operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The journal (or another persisted structure) is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A set operation was used on a value key, or a value operation on a set key.
    #[error("operation against a key holding the wrong kind of value: {key}")]
    WrongType {
        /// The offending key.
        key: String,
    },

    /// `incr` was called on a value that is not a decimal integer.
    #[error("value at {key} is not an integer")]
    NotAnInteger {
        /// The offending key.
        key: String,
    },

    /// Another process holds the data directory lock.
    #[error("storage locked: another process has exclusive access")]
    Locked,

    /// The backend cannot be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A journal entry could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates a wrong-type error for `key`.
    pub fn wrong_type(key: &str) -> Self {
        Self::WrongType {
            key: key.to_string(),
        }
    }
}
