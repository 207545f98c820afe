//! Owner index repair.

use crate::error::CoreResult;
use crate::store::RecordStore;
use serde::Serialize;

/// What a [`RecordStore::reconcile`] pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Records read from the primary namespace.
    pub records_scanned: usize,
    /// Index entries pointing at a missing or foreign record.
    pub dangling_removed: usize,
    /// Records that were missing from their creator's index.
    pub missing_added: usize,
}

impl ReconcileReport {
    /// Returns true if the pass changed nothing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dangling_removed == 0 && self.missing_added == 0
    }
}

impl RecordStore {
    /// Brings the owner index back in line with the primary entries.
    ///
    /// Removes index entries whose record is gone or belongs to someone
    /// else, then adds every record missing from its creator's index.
    /// Running it twice in a row leaves the second report clean.
    ///
    /// # Errors
    ///
    /// Returns `Storage` or `Corrupted`; work done before the error stays.
    pub fn reconcile(&self) -> CoreResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let owner_prefix = self.owner_scan_prefix();

        for index_key in self.backend().scan_prefix(&owner_prefix)? {
            let owner = &index_key[owner_prefix.len()..];
            for id in self.backend().set_members(&index_key)? {
                let keep = matches!(self.get(&id)?, Some(record) if record.creator_id == owner);
                if !keep && self.backend().set_remove(&index_key, &id)? {
                    tracing::debug!(owner, id = %id, "removed dangling owner index entry");
                    report.dangling_removed += 1;
                }
            }
        }

        for record in self.scan_records()? {
            report.records_scanned += 1;
            if self
                .backend()
                .set_add(&self.owner_key(&record.creator_id), &record.id)?
            {
                tracing::debug!(id = %record.id, creator = %record.creator_id, "restored owner index entry");
                report.missing_added += 1;
            }
        }

        tracing::info!(
            records = report.records_scanned,
            dangling_removed = report.dangling_removed,
            missing_added = report.missing_added,
            "owner index reconciled"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::RecordDraft;
    use crate::schema::StaticSchema;
    use std::sync::Arc;
    use workid_storage::{InMemoryBackend, KvBackend};

    #[test]
    fn repairs_both_directions() {
        let store = RecordStore::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(StaticSchema::new()),
            Config::default(),
        )
        .unwrap();
        let kept = store.create(RecordDraft::new("kept", "ana")).unwrap();
        let orphan = store.create(RecordDraft::new("orphan", "bob")).unwrap();

        store.backend().set_add("ownerindex:ana", "GHOST").unwrap();
        store.backend().set_add("ownerindex:ana", &orphan.id).unwrap();
        store.backend().set_remove("ownerindex:bob", &orphan.id).unwrap();

        let report = store.reconcile().unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                records_scanned: 2,
                dangling_removed: 2,
                missing_added: 1,
            }
        );
        assert_eq!(store.backend().set_members("ownerindex:ana").unwrap(), vec![kept.id]);
        assert_eq!(store.backend().set_members("ownerindex:bob").unwrap(), vec![orphan.id]);

        assert!(store.reconcile().unwrap().is_clean());
    }
}
