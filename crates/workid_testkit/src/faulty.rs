//! Fault injection.
//!
//! [`FaultyBackend`] wraps another backend and fails chosen operations
//! with [`StorageError::Unavailable`], the way an unreachable store would.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use workid_storage::{InMemoryBackend, KvBackend, StorageError, StorageResult};

/// A backend operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `get`
    Get,
    /// `set`
    Set,
    /// `set_if_absent`
    SetIfAbsent,
    /// `compare_and_set`
    CompareAndSet,
    /// `delete`
    Delete,
    /// `scan_prefix`
    ScanPrefix,
    /// `set_add`
    SetAdd,
    /// `set_remove`
    SetRemove,
    /// `set_members`
    SetMembers,
    /// `incr`
    Incr,
}

impl Op {
    /// Every operation.
    pub const ALL: [Op; 10] = [
        Op::Get,
        Op::Set,
        Op::SetIfAbsent,
        Op::CompareAndSet,
        Op::Delete,
        Op::ScanPrefix,
        Op::SetAdd,
        Op::SetRemove,
        Op::SetMembers,
        Op::Incr,
    ];
}

/// A backend that fails selected operations on demand.
pub struct FaultyBackend {
    inner: Arc<dyn KvBackend>,
    failing: Mutex<HashSet<Op>>,
}

impl std::fmt::Debug for FaultyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultyBackend")
            .field("failing", &*self.failing.lock())
            .finish_non_exhaustive()
    }
}

impl Default for FaultyBackend {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }
}

impl FaultyBackend {
    /// Wraps `inner`; nothing fails until asked to.
    pub fn new(inner: Arc<dyn KvBackend>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Makes `op` fail until healed.
    pub fn fail(&self, op: Op) {
        self.failing.lock().insert(op);
    }

    /// Makes every operation fail.
    pub fn go_offline(&self) {
        self.failing.lock().extend(Op::ALL);
    }

    /// Lets `op` succeed again.
    pub fn heal(&self, op: Op) {
        self.failing.lock().remove(&op);
    }

    /// Lets every operation succeed again.
    pub fn heal_all(&self) {
        self.failing.lock().clear();
    }

    /// The wrapped backend, bypassing fault injection.
    pub fn inner(&self) -> &dyn KvBackend {
        self.inner.as_ref()
    }

    fn check(&self, op: Op) -> StorageResult<()> {
        if self.failing.lock().contains(&op) {
            Err(StorageError::unavailable(format!("injected failure on {op:?}")))
        } else {
            Ok(())
        }
    }
}

impl KvBackend for FaultyBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check(Op::Get)?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.check(Op::Set)?;
        self.inner.set(key, value)
    }

    fn set_if_absent(&self, key: &str, value: &[u8]) -> StorageResult<bool> {
        self.check(Op::SetIfAbsent)?;
        self.inner.set_if_absent(key, value)
    }

    fn compare_and_set(&self, key: &str, expected: &[u8], value: &[u8]) -> StorageResult<bool> {
        self.check(Op::CompareAndSet)?;
        self.inner.compare_and_set(key, expected, value)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.check(Op::Delete)?;
        self.inner.delete(key)
    }

    fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.check(Op::ScanPrefix)?;
        self.inner.scan_prefix(prefix)
    }

    fn set_add(&self, key: &str, member: &str) -> StorageResult<bool> {
        self.check(Op::SetAdd)?;
        self.inner.set_add(key, member)
    }

    fn set_remove(&self, key: &str, member: &str) -> StorageResult<bool> {
        self.check(Op::SetRemove)?;
        self.inner.set_remove(key, member)
    }

    fn set_members(&self, key: &str) -> StorageResult<Vec<String>> {
        self.check(Op::SetMembers)?;
        self.inner.set_members(key)
    }

    fn incr(&self, key: &str) -> StorageResult<i64> {
        self.check(Op::Incr)?;
        self.inner.incr(key)
    }

    fn sync(&self) -> StorageResult<()> {
        self.inner.sync()
    }
}
