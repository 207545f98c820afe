//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use workid_core::{Config, RecordDraft, RecordStore, SchemaProvider, StaticSchema};
use workid_storage::{FileBackend, InMemoryBackend, KvBackend};

/// Schema used by the fixtures: one single-valued and one multi-valued field.
pub fn test_schema() -> StaticSchema {
    StaticSchema::new()
        .single("Work Type", ["Design", "Audit", "Analysis"])
        .multi("Apps", ["Excel", "Word", "Figma"])
}

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: RecordStore,
    /// The backend under the store.
    pub backend: Arc<dyn KvBackend>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a store over a fresh in-memory backend.
    pub fn memory() -> Self {
        Self::with_backend(Arc::new(InMemoryBackend::new()), Config::default())
    }

    /// Creates a store over a fresh in-memory backend with `config`.
    pub fn memory_with(config: Config) -> Self {
        Self::with_backend(Arc::new(InMemoryBackend::new()), config)
    }

    /// Creates a store over a journaled backend in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend = FileBackend::open(temp_dir.path())
            .expect("Failed to open file backend")
            .sync_on_write(false);
        let mut store = Self::with_backend(Arc::new(backend), Config::default());
        store.temp_dir = Some(temp_dir);
        store
    }

    /// Creates a store over `backend` with the fixture schema.
    pub fn with_backend(backend: Arc<dyn KvBackend>, config: Config) -> Self {
        let schema: Arc<dyn SchemaProvider> = Arc::new(test_schema());
        let store = RecordStore::new(Arc::clone(&backend), schema, config)
            .expect("Failed to create record store");
        Self {
            store,
            backend,
            temp_dir: None,
        }
    }

    /// Returns the store directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }
}

impl std::ops::Deref for TestStore {
    type Target = RecordStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_memory_store<F, R>(f: F) -> R
where
    F: FnOnce(&RecordStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary file-backed store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&RecordStore, &Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use workid_core::Record;

    /// Creates `count` records owned by `creator`, titled `"{prefix} {i}"`.
    pub fn populate(store: &RecordStore, creator: &str, prefix: &str, count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                store
                    .create(RecordDraft::new(format!("{prefix} {i}"), creator))
                    .expect("Failed to create record")
            })
            .collect()
    }

    /// Creates one public and one private record for each of `owners`.
    pub fn mixed_visibility(store: &RecordStore, owners: &[&str]) -> Vec<Record> {
        let mut records = Vec::with_capacity(owners.len() * 2);
        for owner in owners {
            for public in [true, false] {
                let label = if public { "public" } else { "private" };
                let record = store
                    .create(RecordDraft::new(format!("{owner} {label}"), *owner).public(public))
                    .expect("Failed to create record");
                records.push(record);
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let test_store = TestStore::memory();
        assert_eq!(test_store.count().unwrap(), 0);
        assert!(test_store.path().is_none());
    }

    #[test]
    fn test_file_store() {
        with_file_store(|store, path| {
            store.create(RecordDraft::new("t", "ana")).unwrap();
            assert!(path.join("journal.wjl").exists());
        });
    }

    #[test]
    fn test_populated_scenario() {
        with_memory_store(|store| {
            let records = scenarios::populate(store, "ana", "Item", 5);
            assert_eq!(records.len(), 5);
            assert_eq!(store.count().unwrap(), 5);
        });
    }
}
