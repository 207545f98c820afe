//! Record store: CRUD over a [`KvBackend`].
//!
//! Layout in the backing store:
//!
//! | Key                          | Kind  | Content                     |
//! |------------------------------|-------|-----------------------------|
//! | `{record_prefix}:{id}`       | value | JSON document of the record |
//! | `{owner_index_prefix}:{who}` | set   | ids created by `who`        |
//!
//! The primary entry is authoritative. The owner index is derived from it
//! and may briefly lag after a partial failure; [`RecordStore::reconcile`]
//! repairs it.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::id::IdGenerator;
use crate::model::{non_blank, validate_id, Record, RecordDraft, RecordPatch};
use crate::schema::{check_fields, normalize_meta, SchemaProvider};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use workid_storage::KvBackend;

/// Current wall-clock instant.
fn now() -> DateTime<Utc> {
    Utc::now()
}

/// The record store.
///
/// Holds an owned handle to the backing store; construct one per
/// deployment and share it (it is `Send + Sync`).
///
/// ```rust
/// use std::sync::Arc;
/// use workid_core::{Config, RecordDraft, RecordStore, StaticSchema};
/// use workid_storage::InMemoryBackend;
///
/// let store = RecordStore::new(
///     Arc::new(InMemoryBackend::new()),
///     Arc::new(StaticSchema::new()),
///     Config::default(),
/// )
/// .unwrap();
///
/// let record = store.create(RecordDraft::new("Inventory", "ana@example.org")).unwrap();
/// assert_eq!(store.get(&record.id).unwrap(), Some(record));
/// ```
pub struct RecordStore {
    backend: Arc<dyn KvBackend>,
    schema: Arc<dyn SchemaProvider>,
    config: Config,
    ids: IdGenerator,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("config", &self.config)
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl RecordStore {
    /// Creates a store over `backend`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is inconsistent or a declared
    /// meta field shadows a record field.
    pub fn new(
        backend: Arc<dyn KvBackend>,
        schema: Arc<dyn SchemaProvider>,
        config: Config,
    ) -> CoreResult<Self> {
        config.validate()?;
        check_fields(&schema.list_fields())?;
        let ids = IdGenerator::new(&config.id_scheme, config.max_id_attempts, Arc::clone(&backend))?;
        Ok(Self {
            backend,
            schema,
            config,
            ids,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the schema provider.
    #[must_use]
    pub fn schema(&self) -> &dyn SchemaProvider {
        self.schema.as_ref()
    }

    /// Returns the backing store.
    #[must_use]
    pub fn backend(&self) -> &dyn KvBackend {
        self.backend.as_ref()
    }

    pub(crate) fn record_key(&self, id: &str) -> String {
        format!("{}:{id}", self.config.record_prefix)
    }

    pub(crate) fn record_scan_prefix(&self) -> String {
        format!("{}:", self.config.record_prefix)
    }

    pub(crate) fn owner_key(&self, creator_id: &str) -> String {
        format!("{}:{creator_id}", self.config.owner_index_prefix)
    }

    pub(crate) fn owner_scan_prefix(&self) -> String {
        format!("{}:", self.config.owner_index_prefix)
    }

    /// Returns an id not currently used by any record.
    ///
    /// The id is not reserved; a concurrent create may still take it.
    ///
    /// # Errors
    ///
    /// Returns `IdSpaceExhausted` or `Storage`.
    pub fn new_id(&self) -> CoreResult<String> {
        self.ids.generate(|candidate| self.exists(candidate))
    }

    /// Returns true if a record with `id` exists.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backend fails.
    pub fn exists(&self, id: &str) -> CoreResult<bool> {
        if validate_id(id).is_err() {
            return Ok(false);
        }
        Ok(self.backend.get(&self.record_key(id))?.is_some())
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backend fails.
    pub fn count(&self) -> CoreResult<usize> {
        Ok(self.backend.scan_prefix(&self.record_scan_prefix())?.len())
    }

    /// Creates a record.
    ///
    /// Assigns an id when the draft has none, sets `created_at` and
    /// `changed_at` to now, stores the record and adds it to its
    /// creator's owner index.
    ///
    /// # Errors
    ///
    /// - `Validation` if the draft breaks an invariant; nothing is written.
    /// - `Conflict` if the requested id is already taken.
    /// - `IdSpaceExhausted` if no free id was found.
    /// - `Storage` if a write fails. A failed owner-index write rolls the
    ///   primary entry back first.
    pub fn create(&self, draft: RecordDraft) -> CoreResult<Record> {
        draft.validate()?;
        let meta = normalize_meta(&self.schema.list_fields(), &draft.meta)?;
        let created_at = now();
        let mut record = Record {
            id: String::new(),
            title: draft.title.trim().to_string(),
            description: draft.description.as_deref().and_then(non_blank),
            creator_id: draft.creator_id.trim().to_string(),
            active: draft.active.unwrap_or(true),
            public: draft.public.unwrap_or(self.config.default_public),
            time_start: draft.time_start,
            time_end: draft.time_end,
            created_at,
            changed_at: created_at,
            version: 1,
            meta,
        };

        match draft.id {
            Some(id) => {
                record.id = id;
                let written = self
                    .backend
                    .set_if_absent(&self.record_key(&record.id), &self.encode(&record)?)?;
                if !written {
                    return Err(CoreError::conflict(record.id));
                }
            }
            None => {
                let id = self.ids.generate(|candidate| {
                    record.id = candidate.to_string();
                    let bytes = self.encode(&record)?;
                    Ok(!self.backend.set_if_absent(&self.record_key(candidate), &bytes)?)
                })?;
                record.id = id;
            }
        }

        if let Err(err) = self
            .backend
            .set_add(&self.owner_key(&record.creator_id), &record.id)
        {
            tracing::warn!(
                id = %record.id,
                creator = %record.creator_id,
                error = %err,
                "owner index write failed, rolling back record"
            );
            if let Err(rollback) = self.backend.delete(&self.record_key(&record.id)) {
                tracing::error!(
                    id = %record.id,
                    error = %rollback,
                    "rollback failed, record left without owner index entry"
                );
            }
            return Err(err.into());
        }

        tracing::info!(id = %record.id, creator = %record.creator_id, "record created");
        Ok(record)
    }

    /// Fetches a record by id. Absent records yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backend fails or `Corrupted` if the stored
    /// document does not decode.
    pub fn get(&self, id: &str) -> CoreResult<Option<Record>> {
        Ok(self.load(id)?.map(|(record, _)| record))
    }

    /// Reads and decodes a record, returning the raw bytes alongside.
    pub(crate) fn load(&self, id: &str) -> CoreResult<Option<(Record, Vec<u8>)>> {
        if validate_id(id).is_err() {
            return Ok(None);
        }
        let key = self.record_key(id);
        match self.backend.get(&key)? {
            Some(bytes) => Ok(Some((self.decode(&key, &bytes)?, bytes))),
            None => Ok(None),
        }
    }

    /// Reads a record by its full key.
    pub(crate) fn load_key(&self, key: &str) -> CoreResult<Option<Record>> {
        match self.backend.get(key)? {
            Some(bytes) => self.decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Applies `patch` to the record `id` on behalf of `actor`.
    ///
    /// Merges the patch over the stored record, re-validates, bumps
    /// `version` and sets `changed_at` to now (never earlier than its
    /// previous value). The write is a compare-and-set against the bytes
    /// that were read; a concurrent writer causes a re-read and re-merge.
    ///
    /// # Errors
    ///
    /// - `NotFound` if there is no such record.
    /// - `Unauthorized` if `actor` is not the creator.
    /// - `Conflict` if `expected_version` does not match, or the retry
    ///   budget is spent under contention.
    /// - `Validation` if the merged record breaks an invariant.
    /// - `Storage` / `Corrupted` from the backend.
    pub fn update(&self, id: &str, patch: &RecordPatch, actor: &str) -> CoreResult<Record> {
        let key = self.record_key(id);
        let fields = self.schema.list_fields();

        for attempt in 1..=self.config.max_update_attempts {
            let Some((current, raw)) = self.load(id)? else {
                return Err(CoreError::not_found(id));
            };
            if current.creator_id != actor {
                tracing::warn!(id, actor, "update rejected, actor is not the creator");
                return Err(CoreError::unauthorized(id, actor));
            }
            if let Some(expected) = patch.expected_version {
                if expected != current.version {
                    return Err(CoreError::conflict(id));
                }
            }

            let mut next = current.clone();
            patch.apply_to(&mut next);
            next.meta = normalize_meta(&fields, &next.meta)?;
            next.validate()?;
            next.changed_at = now().max(current.changed_at);
            next.version = current.version + 1;

            if self.backend.compare_and_set(&key, &raw, &self.encode(&next)?)? {
                tracing::info!(id, version = next.version, "record updated");
                return Ok(next);
            }
            tracing::debug!(id, attempt, "concurrent write detected, retrying update");
        }

        tracing::warn!(
            id,
            attempts = self.config.max_update_attempts,
            "update gave up under contention"
        );
        Err(CoreError::conflict(id))
    }

    /// Deletes the record `id`.
    ///
    /// With an `actor`, only the creator may delete. Removes the primary
    /// entry first, then the owner index entry.
    ///
    /// Returns `Ok(false)` if there was nothing to delete.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if `actor` is given and is not the creator.
    /// - `Corrupted` if an `actor` is given but the stored document cannot
    ///   be decoded to check ownership.
    /// - `Storage` if removing the primary entry fails.
    pub fn delete(&self, id: &str, actor: Option<&str>) -> CoreResult<bool> {
        if validate_id(id).is_err() {
            return Ok(false);
        }
        let key = self.record_key(id);
        let Some(bytes) = self.backend.get(&key)? else {
            return Ok(false);
        };

        let creator = match (self.decode(&key, &bytes), actor) {
            (Ok(record), Some(actor)) if record.creator_id != actor => {
                tracing::warn!(id, actor, "delete rejected, actor is not the creator");
                return Err(CoreError::unauthorized(id, actor));
            }
            (Ok(record), _) => Some(record.creator_id),
            (Err(err), Some(_)) => return Err(err),
            (Err(err), None) => {
                tracing::warn!(id, error = %err, "deleting undecodable record");
                None
            }
        };

        if !self.backend.delete(&key)? {
            return Ok(false);
        }

        if let Some(creator) = creator {
            if let Err(err) = self.backend.set_remove(&self.owner_key(&creator), id) {
                tracing::warn!(
                    id,
                    creator = %creator,
                    error = %err,
                    "owner index cleanup failed, leaving dangling entry"
                );
            }
        }

        tracing::info!(id, "record deleted");
        Ok(true)
    }

    fn encode(&self, record: &Record) -> CoreResult<Vec<u8>> {
        record
            .to_bytes()
            .map_err(|err| CoreError::corrupted(self.record_key(&record.id), err.to_string()))
    }

    pub(crate) fn decode(&self, key: &str, bytes: &[u8]) -> CoreResult<Record> {
        Record::from_bytes(bytes).map_err(|err| {
            tracing::error!(key, error = %err, "stored record does not decode");
            CoreError::corrupted(key, err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ValidationError};
    use crate::model::MetaValue;
    use crate::schema::StaticSchema;
    use chrono::TimeZone;
    use workid_storage::InMemoryBackend;

    fn store_with(backend: Arc<InMemoryBackend>) -> RecordStore {
        let schema = StaticSchema::new()
            .single("Work Type", ["Design", "Audit"])
            .multi("Apps", ["Excel", "Word"]);
        RecordStore::new(backend, Arc::new(schema), Config::default()).unwrap()
    }

    fn store() -> RecordStore {
        store_with(Arc::new(InMemoryBackend::new()))
    }

    #[test]
    fn create_and_get() {
        let store = store();
        let record = store
            .create(
                RecordDraft::new("  Inventory ", "ana")
                    .description("")
                    .meta("work_type", MetaValue::scalar("Audit"))
                    .meta("unknown", MetaValue::scalar("x")),
            )
            .unwrap();

        assert_eq!(record.title, "Inventory");
        assert!(record.description.is_none());
        assert_eq!(record.created_at, record.changed_at);
        assert_eq!(record.version, 1);
        assert!(record.active);
        assert!(record.public);
        assert_eq!(record.meta.len(), 1);
        assert_eq!(record.id.len(), 9);

        assert_eq!(store.get(&record.id).unwrap(), Some(record.clone()));
        assert_eq!(
            store.backend().set_members("ownerindex:ana").unwrap(),
            vec![record.id]
        );
    }

    #[test]
    fn schema_shadowing_a_record_field_is_refused() {
        let schema = StaticSchema::new().single("Title", ["a"]);
        let err = RecordStore::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(schema),
            Config::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    /// Declares `title` only after the store has been built.
    struct LateShadow(std::sync::atomic::AtomicBool);

    impl SchemaProvider for LateShadow {
        fn list_fields(&self) -> Vec<crate::schema::FieldSpec> {
            if !self.0.load(std::sync::atomic::Ordering::SeqCst) {
                return Vec::new();
            }
            vec![crate::schema::FieldSpec {
                field_id: "title".to_string(),
                label: "Title".to_string(),
                options: Vec::new(),
                multiple: false,
                order: 0,
            }]
        }
    }

    #[test]
    fn late_shadowing_field_keeps_documents_readable() {
        let schema = Arc::new(LateShadow(std::sync::atomic::AtomicBool::new(false)));
        let store = RecordStore::new(
            Arc::new(InMemoryBackend::new()),
            Arc::clone(&schema) as Arc<dyn SchemaProvider>,
            Config::default(),
        )
        .unwrap();
        schema.0.store(true, std::sync::atomic::Ordering::SeqCst);

        let record = store
            .create(RecordDraft::new("Real", "ana").meta("title", MetaValue::scalar("Shadow")))
            .unwrap();
        assert!(record.meta.is_empty());

        let fetched = store.get(&record.id).unwrap().unwrap();
        assert_eq!(fetched.title, "Real");
        assert_eq!(store.list(&crate::ListQuery::public()).unwrap().total, 1);
    }

    #[test]
    fn overlong_id_pattern_is_refused() {
        let err = RecordStore::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(StaticSchema::new()),
            Config::default().id_pattern("X".repeat(130)),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn longest_generated_ids_stay_addressable() {
        let store = RecordStore::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(StaticSchema::new()),
            Config::default().id_pattern("X".repeat(128)),
        )
        .unwrap();
        let record = store.create(RecordDraft::new("t", "ana")).unwrap();
        assert_eq!(store.get(&record.id).unwrap(), Some(record.clone()));
        assert!(store.delete(&record.id, Some("ana")).unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn get_missing_is_none() {
        let store = store();
        assert_eq!(store.get("NOPE").unwrap(), None);
        assert_eq!(store.get("bad:id").unwrap(), None);
    }

    #[test]
    fn client_id_conflict() {
        let store = store();
        store.create(RecordDraft::new("a", "ana").id("(ML-3A)")).unwrap();
        let err = store
            .create(RecordDraft::new("b", "bob").id("(ML-3A)"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict { ref id } if id == "(ML-3A)"));
        assert_eq!(store.get("(ML-3A)").unwrap().unwrap().title, "a");
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn invalid_draft_writes_nothing() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = store_with(Arc::clone(&backend));
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        assert!(store
            .create(RecordDraft::new("t", "ana").time_start(t2).time_end(t1))
            .is_err());
        assert!(store
            .create(RecordDraft::new("t", "ana").meta("apps", MetaValue::scalar("Word")))
            .is_err());
        assert!(backend.is_empty());
    }

    #[test]
    fn update_merges_and_bumps() {
        let store = store();
        let created = store
            .create(
                RecordDraft::new("Old", "ana")
                    .description("keep me")
                    .meta("work_type", MetaValue::scalar("Design"))
                    .meta("apps", MetaValue::list(["Excel"])),
            )
            .unwrap();

        let updated = store
            .update(
                &created.id,
                &RecordPatch::new()
                    .title("New")
                    .meta("apps", MetaValue::list(["Word"])),
                "ana",
            )
            .unwrap();

        assert_eq!(updated.title, "New");
        assert_eq!(updated.description.as_deref(), Some("keep me"));
        assert_eq!(updated.meta["work_type"], MetaValue::scalar("Design"));
        assert_eq!(updated.meta["apps"], MetaValue::list(["Word"]));
        assert_eq!(updated.version, 2);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.changed_at >= created.changed_at);
        assert_eq!(store.get(&created.id).unwrap(), Some(updated));
    }

    #[test]
    fn update_errors() {
        let store = store();
        let record = store.create(RecordDraft::new("t", "ana")).unwrap();

        assert!(matches!(
            store.update("MISSING", &RecordPatch::new(), "ana"),
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.update(&record.id, &RecordPatch::new().title("x"), "eve"),
            Err(CoreError::Unauthorized { .. })
        ));
        assert!(matches!(
            store.update(&record.id, &RecordPatch::new().title("  "), "ana"),
            Err(CoreError::Validation(ValidationError::MissingTitle))
        ));
        assert!(matches!(
            store.update(&record.id, &RecordPatch::new().expect_version(7), "ana"),
            Err(CoreError::Conflict { .. })
        ));
        assert_eq!(store.get(&record.id).unwrap(), Some(record));
    }

    #[test]
    fn expected_version_matches() {
        let store = store();
        let record = store.create(RecordDraft::new("t", "ana")).unwrap();
        let updated = store
            .update(&record.id, &RecordPatch::new().public(false).expect_version(1), "ana")
            .unwrap();
        assert!(!updated.public);
        assert!(store
            .update(&record.id, &RecordPatch::new().expect_version(1), "ana")
            .is_err());
    }

    #[test]
    fn delete_removes_primary_and_index() {
        let store = store();
        let record = store.create(RecordDraft::new("t", "ana")).unwrap();

        assert!(matches!(
            store.delete(&record.id, Some("eve")),
            Err(CoreError::Unauthorized { .. })
        ));
        assert!(store.delete(&record.id, Some("ana")).unwrap());
        assert!(!store.delete(&record.id, None).unwrap());
        assert!(store.get(&record.id).unwrap().is_none());
        assert!(store.backend().set_members("ownerindex:ana").unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn corrupted_payload() {
        let store = store();
        store.backend().set("record:BAD", b"not json").unwrap();

        let err = store.get("BAD").unwrap_err();
        assert!(matches!(err, CoreError::Corrupted { ref key, .. } if key == "record:BAD"));
        assert!(store.delete("BAD", Some("ana")).is_err());
        assert!(store.delete("BAD", None).unwrap());
    }

    #[test]
    fn new_id_is_unused() {
        let store = store();
        let id = store.new_id().unwrap();
        assert!(!store.exists(&id).unwrap());
    }
}
