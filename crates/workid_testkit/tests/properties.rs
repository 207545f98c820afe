//! End-to-end behaviour of the record store.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use workid_core::{
    Config, CoreError, ListQuery, MetaValue, RecordDraft, RecordPatch, SearchQuery,
    ValidationError,
};
use workid_storage::{InMemoryBackend, KvBackend};
use workid_testkit::prelude::*;

#[test]
fn generated_ids_avoid_existing_records() {
    // Tiny id space: 34 possible ids, 30 already taken.
    let store = TestStore::memory_with(Config::default().id_pattern("X").max_id_attempts(10_000));
    let mut taken = HashSet::new();
    for c in "ABCDEFGHIJKLMNPQRSTUVWXYZ12345".chars() {
        let id = c.to_string();
        store.create(RecordDraft::new("seed", "ana").id(id.clone())).unwrap();
        taken.insert(id);
    }

    for _ in 0..50 {
        let id = store.new_id().unwrap();
        assert!(!taken.contains(&id), "generated an existing id {id}");
    }

    let created = store.create(RecordDraft::new("fresh", "ana")).unwrap();
    assert!(!taken.contains(&created.id));
}

#[test]
fn full_id_space_is_reported() {
    let store = TestStore::memory_with(Config::default().id_pattern("FIXED"));
    store.create(RecordDraft::new("first", "ana")).unwrap();
    assert!(matches!(
        store.create(RecordDraft::new("second", "ana")),
        Err(CoreError::IdSpaceExhausted { attempts: 1 })
    ));
}

#[test]
fn create_then_get_round_trips() {
    let store = TestStore::memory();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let draft = RecordDraft::new("Inventory", "ana@example.org")
        .description("Count the shelves")
        .public(false)
        .active(false)
        .time_start(start)
        .time_end(start + Duration::hours(4))
        .meta("work_type", MetaValue::scalar("Audit"))
        .meta("apps", MetaValue::list(["Excel", "Word"]));

    let before = Utc::now();
    let created = store.create(draft.clone()).unwrap();
    let fetched = store.get(&created.id).unwrap().unwrap();

    assert_eq!(fetched, created);
    assert_eq!(fetched.title, draft.title);
    assert_eq!(fetched.description, draft.description);
    assert_eq!(fetched.creator_id, draft.creator_id);
    assert_eq!(Some(fetched.public), draft.public);
    assert_eq!(Some(fetched.active), draft.active);
    assert_eq!(fetched.time_start, draft.time_start);
    assert_eq!(fetched.time_end, draft.time_end);
    assert_eq!(fetched.meta, draft.meta);
    assert_eq!(fetched.created_at, fetched.changed_at);
    assert!(fetched.created_at >= before);
}

#[test]
fn update_never_touches_identity_fields() {
    let store = TestStore::memory();
    let created = store.create(RecordDraft::new("Original", "ana")).unwrap();

    let body = serde_json_body(&created.id);
    let patch = RecordPatch::from_json(&body).unwrap();
    let updated = store.update(&created.id, &patch, "ana").unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.creator_id, "ana");
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.title, "Renamed");
    assert_eq!(store.get(&created.id).unwrap(), Some(updated));
    assert!(store.get("HIJACK").unwrap().is_none());
}

fn serde_json_body(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "HIJACK",
        "creator_id": "other",
        "created_at": "2000-01-01",
        "title": "Renamed",
        "note": id,
    })
}

#[test]
fn changed_at_never_decreases() {
    let store = TestStore::memory();
    let record = store.create(RecordDraft::new("t", "ana")).unwrap();
    let mut previous = record.changed_at;
    for i in 0..20 {
        let updated = store
            .update(&record.id, &RecordPatch::new().title(format!("t{i}")), "ana")
            .unwrap();
        assert!(updated.changed_at >= previous);
        assert_eq!(updated.created_at, record.created_at);
        previous = updated.changed_at;
    }
    assert_eq!(store.get(&record.id).unwrap().unwrap().version, 21);
}

#[test]
fn search_is_an_and_of_terms() {
    let store = TestStore::memory();
    let alpha_report = store.create(RecordDraft::new("Alpha Report", "ana")).unwrap();
    let beta_report = store.create(RecordDraft::new("Beta Report", "ana")).unwrap();
    let alpha_summary = store.create(RecordDraft::new("Alpha Summary", "ana")).unwrap();

    let ids = |text: &str| -> HashSet<String> {
        store
            .search(&SearchQuery::new(text))
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect()
    };

    assert_eq!(ids("Alpha Report"), HashSet::from([alpha_report.id.clone()]));
    assert_eq!(
        ids("Report"),
        HashSet::from([alpha_report.id.clone(), beta_report.id.clone()])
    );
    assert_eq!(
        ids(""),
        HashSet::from([alpha_report.id, beta_report.id, alpha_summary.id])
    );
    assert!(ids("\"alpha summary\" report").is_empty());
}

#[test]
fn search_orders_newest_first() {
    let store = TestStore::memory();
    let older = store.create(RecordDraft::new("report one", "ana")).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let newer = store.create(RecordDraft::new("report two", "ana")).unwrap();

    let hits = store.search(&SearchQuery::new("report")).unwrap();
    assert_eq!(hits[0].id, newer.id);
    assert_eq!(hits[1].id, older.id);
}

#[test]
fn pagination_arithmetic() {
    let store = TestStore::memory();
    scenarios::populate(&store, "ana", "Item", 23);

    let query = ListQuery::owned_by("ana").per_page(7);
    let page = store.list(&query.clone().page(1)).unwrap();
    assert_eq!(page.total, 23);
    assert_eq!(page.page_count, 4);
    assert_eq!(page.items.len(), 7);

    let last = store.list(&query.clone().page(4)).unwrap();
    assert_eq!(last.items.len(), 2);

    let past = store.list(&query.page(5)).unwrap();
    assert!(past.items.is_empty());
    assert_eq!(past.total, 23);
    assert_eq!(past.page_count, 4);
}

#[test]
fn pages_cover_every_record_once() {
    let store = TestStore::memory();
    let created: HashSet<String> = scenarios::populate(&store, "ana", "Item", 23)
        .into_iter()
        .map(|r| r.id)
        .collect();

    let mut seen = Vec::new();
    for page in 1..=4 {
        let page = store
            .list(&ListQuery::owned_by("ana").per_page(7).page(page))
            .unwrap();
        seen.extend(page.items.into_iter().map(|r| r.id));
    }
    assert_eq!(seen.len(), 23);
    assert_eq!(seen.into_iter().collect::<HashSet<_>>(), created);
}

#[test]
fn private_records_stay_private() {
    let store = TestStore::memory();
    let secret = store
        .create(RecordDraft::new("secret plan", "a@example.org").public(false))
        .unwrap();

    let for_b = store.list(&ListQuery::visible_to("b@example.org")).unwrap();
    assert!(for_b.items.iter().all(|r| r.id != secret.id));

    let for_a = store.list(&ListQuery::owned_by("a@example.org")).unwrap();
    assert!(for_a.items.iter().any(|r| r.id == secret.id));

    let search_b = store
        .search(&SearchQuery::new("secret").visible_to("b@example.org"))
        .unwrap();
    assert!(search_b.is_empty());
}

#[test]
fn inverted_time_range_persists_nothing() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = TestStore::with_backend(backend.clone(), Config::default());
    let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

    let err = store
        .create(RecordDraft::new("t", "ana").id("T-1").time_start(t2).time_end(t1))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::TimeRangeInverted { .. })
    ));
    assert!(backend.is_empty());
    assert!(backend.scan_prefix("").unwrap().is_empty());
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn any_valid_draft_round_trips(draft in draft_strategy()) {
        let store = TestStore::memory();
        let created = store.create(draft.clone()).unwrap();
        let fetched = store.get(&created.id).unwrap().unwrap();
        prop_assert_eq!(&fetched, &created);
        prop_assert_eq!(fetched.title, draft.title.trim());
        prop_assert_eq!(fetched.creator_id, draft.creator_id);
        prop_assert_eq!(fetched.time_start, draft.time_start);
        prop_assert_eq!(fetched.time_end, draft.time_end);
        prop_assert_eq!(fetched.meta, draft.meta);
    }

    #[test]
    fn every_title_word_finds_its_record(words in prop::collection::vec(query_word_strategy(), 1..4)) {
        let store = TestStore::memory();
        let record = store.create(RecordDraft::new(words.join(" "), "ana")).unwrap();
        store.create(RecordDraft::new("0000", "bob")).unwrap();
        for word in &words {
            let hits = store.search(&SearchQuery::new(word.to_uppercase())).unwrap();
            prop_assert!(hits.iter().any(|r| r.id == record.id));
        }
    }
}
