//! Key-value backend trait definition.

use crate::error::StorageResult;

/// A keyed backing store for Work-ID.
///
/// Backends are **opaque value stores**. They hold byte values and string
/// sets under string keys and know nothing about records, owners or the
/// JSON documents stored in them. The record layer owns all key naming
/// and payload interpretation.
///
/// # Invariants
///
/// - Every single-key operation is atomic with respect to other operations
///   on the same key.
/// - A key holds either a byte value or a set, never both. Mixing kinds
///   fails with [`StorageError::WrongType`](crate::StorageError::WrongType).
/// - `scan_prefix` never holds a lock beyond copying the key list; callers
///   fetch each key afterwards and must tolerate keys that vanished.
/// - Backends must be `Send + Sync` for concurrent access.
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing and ephemeral deployments
/// - [`super::FileBackend`] - Journaled persistent storage
pub trait KvBackend: Send + Sync {
    /// Returns the value stored at `key`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds a set or the backend is unreachable.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` at `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds a set or the write fails.
    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Stores `value` at `key` only if the key does not exist.
    ///
    /// Returns `true` when the value was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_if_absent(&self, key: &str, value: &[u8]) -> StorageResult<bool>;

    /// Replaces the value at `key` only if it currently equals `expected`.
    ///
    /// Returns `false` when the key is absent or holds different bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds a set or the write fails.
    fn compare_and_set(&self, key: &str, expected: &[u8], value: &[u8]) -> StorageResult<bool>;

    /// Removes `key` (value or set). Returns `true` if something was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Returns every key starting with `prefix`, sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Adds `member` to the set at `key`, creating the set if needed.
    ///
    /// Returns `true` if the member was not already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds a value or the write fails.
    fn set_add(&self, key: &str, member: &str) -> StorageResult<bool>;

    /// Removes `member` from the set at `key`.
    ///
    /// Returns `true` if the member was present. An emptied set is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds a value or the write fails.
    fn set_remove(&self, key: &str, member: &str) -> StorageResult<bool>;

    /// Returns the members of the set at `key`, sorted. Absent keys yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the key holds a value or the backend is unreachable.
    fn set_members(&self, key: &str) -> StorageResult<Vec<String>>;

    /// Atomically increments the integer at `key` and returns the new value.
    ///
    /// An absent key counts from zero. The value is stored as decimal text.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotAnInteger`](crate::StorageError::NotAnInteger)
    /// if the existing value does not parse.
    fn incr(&self, key: &str) -> StorageResult<i64>;

    /// Makes all acknowledged writes durable.
    ///
    /// Backends without durable state return `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&self) -> StorageResult<()> {
        Ok(())
    }
}
