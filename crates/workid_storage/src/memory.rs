//! In-memory key-value backend.

use crate::backend::KvBackend;
use crate::error::StorageResult;
use crate::keyspace::Keyspace;
use parking_lot::RwLock;

/// An in-memory key-value backend.
///
/// This backend keeps all keys in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral deployments that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads. Each
/// operation takes the lock once; no lock is held between operations.
///
/// # Example
///
/// ```rust
/// use workid_storage::{InMemoryBackend, KvBackend};
///
/// let backend = InMemoryBackend::new();
/// assert!(backend.set_if_absent("record:AB12", b"{}").unwrap());
/// assert!(!backend.set_if_absent("record:AB12", b"{}").unwrap());
/// assert_eq!(backend.scan_prefix("record:").unwrap(), vec!["record:AB12"]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    space: RwLock<Keyspace>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.space.read().len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every key.
    pub fn clear(&self) {
        *self.space.write() = Keyspace::default();
    }
}

impl KvBackend for InMemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.space.read().get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let mut space = self.space.write();
        let mutation = space.plan_set(key, value)?;
        space.apply(mutation);
        Ok(())
    }

    fn set_if_absent(&self, key: &str, value: &[u8]) -> StorageResult<bool> {
        let mut space = self.space.write();
        Ok(match space.plan_set_if_absent(key, value) {
            Some(mutation) => {
                space.apply(mutation);
                true
            }
            None => false,
        })
    }

    fn compare_and_set(&self, key: &str, expected: &[u8], value: &[u8]) -> StorageResult<bool> {
        let mut space = self.space.write();
        Ok(match space.plan_compare_and_set(key, expected, value)? {
            Some(mutation) => {
                space.apply(mutation);
                true
            }
            None => false,
        })
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut space = self.space.write();
        Ok(match space.plan_delete(key) {
            Some(mutation) => {
                space.apply(mutation);
                true
            }
            None => false,
        })
    }

    fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self.space.read().scan_prefix(prefix))
    }

    fn set_add(&self, key: &str, member: &str) -> StorageResult<bool> {
        let mut space = self.space.write();
        Ok(match space.plan_set_add(key, member)? {
            Some(mutation) => {
                space.apply(mutation);
                true
            }
            None => false,
        })
    }

    fn set_remove(&self, key: &str, member: &str) -> StorageResult<bool> {
        let mut space = self.space.write();
        Ok(match space.plan_set_remove(key, member)? {
            Some(mutation) => {
                space.apply(mutation);
                true
            }
            None => false,
        })
    }

    fn set_members(&self, key: &str) -> StorageResult<Vec<String>> {
        self.space.read().members(key)
    }

    fn incr(&self, key: &str) -> StorageResult<i64> {
        let mut space = self.space.write();
        let (mutation, next) = space.plan_incr(key)?;
        space.apply(mutation);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.is_empty());
        assert!(backend.scan_prefix("").unwrap().is_empty());
    }

    #[test]
    fn memory_get_set_delete() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.get("k").unwrap(), None);

        backend.set("k", b"one").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"one".to_vec()));

        backend.set("k", b"two").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"two".to_vec()));

        assert!(backend.delete("k").unwrap());
        assert!(!backend.delete("k").unwrap());
        assert_eq!(backend.get("k").unwrap(), None);
    }

    #[test]
    fn memory_compare_and_set() {
        let backend = InMemoryBackend::new();
        assert!(!backend.compare_and_set("k", b"x", b"y").unwrap());

        backend.set("k", b"x").unwrap();
        assert!(!backend.compare_and_set("k", b"other", b"y").unwrap());
        assert!(backend.compare_and_set("k", b"x", b"y").unwrap());
        assert_eq!(backend.get("k").unwrap(), Some(b"y".to_vec()));
    }

    #[test]
    fn memory_sets() {
        let backend = InMemoryBackend::new();
        assert!(backend.set_add("s", "b").unwrap());
        assert!(backend.set_add("s", "a").unwrap());
        assert!(!backend.set_add("s", "a").unwrap());
        assert_eq!(backend.set_members("s").unwrap(), vec!["a", "b"]);

        assert!(backend.set_remove("s", "a").unwrap());
        assert!(!backend.set_remove("s", "a").unwrap());
        assert!(backend.set_remove("s", "b").unwrap());
        assert!(backend.is_empty());
    }

    #[test]
    fn memory_incr_counts_from_zero() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.incr("c").unwrap(), 1);
        assert_eq!(backend.incr("c").unwrap(), 2);
        assert_eq!(backend.get("c").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn memory_concurrent_set_if_absent_has_one_winner() {
        let backend = Arc::new(InMemoryBackend::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    backend
                        .set_if_absent("race", format!("{i}").as_bytes())
                        .unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn memory_concurrent_incr_is_atomic() {
        let backend = Arc::new(InMemoryBackend::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    for _ in 0..250 {
                        backend.incr("counter").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(backend.get("counter").unwrap(), Some(b"1000".to_vec()));
    }

    #[test]
    fn memory_clear() {
        let backend = InMemoryBackend::new();
        backend.set("a", b"1").unwrap();
        backend.set_add("b", "x").unwrap();
        backend.clear();
        assert!(backend.is_empty());
    }
}
