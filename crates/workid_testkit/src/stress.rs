//! Stress tests for Work-ID.
//!
//! These helpers drive a shared store from several threads and report
//! what happened, so tests can assert on the outcome.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use workid_core::{CoreError, RecordDraft, RecordPatch, RecordStore};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        Self {
            total_ops: successful + failed,
            successful_ops: successful,
            failed_ops: failed,
            duration,
        }
    }

    /// Operations per second.
    pub fn ops_per_second(&self) -> f64 {
        let seconds = self.duration.as_secs_f64();
        if seconds > 0.0 {
            self.total_ops as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
        }
    }
}

/// Creates records with generated ids from several threads.
///
/// Returns the ids that were handed out; they must all be distinct.
pub fn concurrent_creates(store: &Arc<RecordStore>, config: &StressConfig) -> (StressTestResult, Vec<String>) {
    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(store);
            let operations = config.operations;
            thread::spawn(move || {
                let mut ids = Vec::with_capacity(operations);
                let mut failed = 0;
                for i in 0..operations {
                    match store.create(RecordDraft::new(format!("t{t} r{i}"), format!("user{t}"))) {
                        Ok(record) => ids.push(record.id),
                        Err(_) => failed += 1,
                    }
                }
                (ids, failed)
            })
        })
        .collect();

    let mut all_ids = Vec::new();
    let mut failed = 0;
    for handle in handles {
        let (ids, f) = handle.join().expect("stress thread panicked");
        all_ids.extend(ids);
        failed += f;
    }
    (StressTestResult::new(all_ids.len(), failed, start.elapsed()), all_ids)
}

/// Races `threads` creates on the same client-chosen id.
///
/// Returns how many succeeded and how many saw a conflict.
pub fn racing_client_id(store: &Arc<RecordStore>, id: &str, threads: usize) -> (usize, usize) {
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = Arc::clone(store);
            let id = id.to_string();
            thread::spawn(move || store.create(RecordDraft::new(format!("racer {t}"), "racer").id(id)))
        })
        .collect();

    let mut won = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.join().expect("stress thread panicked") {
            Ok(_) => won += 1,
            Err(CoreError::Conflict { .. }) => conflicts += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    (won, conflicts)
}

/// Updates one record from several threads, each setting a distinct meta
/// value, and returns the number of successful updates.
pub fn concurrent_updates(
    store: &Arc<RecordStore>,
    id: &str,
    owner: &str,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(store);
            let id = id.to_string();
            let owner = owner.to_string();
            let operations = config.operations;
            thread::spawn(move || {
                let mut ok = 0;
                let mut failed = 0;
                for i in 0..operations {
                    let patch = RecordPatch::new().description(format!("thread {t} step {i}"));
                    match store.update(&id, &patch, &owner) {
                        Ok(_) => ok += 1,
                        Err(_) => failed += 1,
                    }
                }
                (ok, failed)
            })
        })
        .collect();

    let (mut ok, mut failed) = (0, 0);
    for handle in handles {
        let (o, f) = handle.join().expect("stress thread panicked");
        ok += o;
        failed += f;
    }
    StressTestResult::new(ok, failed, start.elapsed())
}

/// Returns true if every id in `ids` is distinct.
pub fn all_distinct(ids: &[String]) -> bool {
    ids.iter().collect::<HashSet<_>>().len() == ids.len()
}
