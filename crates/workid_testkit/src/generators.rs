//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use workid_core::{MetaValue, RecordDraft};

/// Strategy for generating creator identities.
pub fn creator_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}@example\\.org").expect("Invalid regex")
}

/// Strategy for generating non-blank titles.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,30}").expect("Invalid regex")
}

/// Strategy for generating client-supplied ids that are valid keys.
pub fn client_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z0-9()\\-]{1,16}").expect("Invalid regex")
}

/// Strategy for generating instants between 2000 and 2100.
pub fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..4_102_444_800i64)
        .prop_map(|seconds| DateTime::from_timestamp(seconds, 0).expect("in range"))
}

/// Strategy for an optional, ordered time window.
pub fn window_strategy() -> impl Strategy<Value = (Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    prop_oneof![
        Just((None, None)),
        instant_strategy().prop_map(|t| (Some(t), None)),
        instant_strategy().prop_map(|t| (None, Some(t))),
        (instant_strategy(), instant_strategy()).prop_map(|(a, b)| {
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            (Some(start), Some(end))
        }),
    ]
}

/// Strategy for valid meta values under the fixture schema.
pub fn fixture_meta_strategy() -> impl Strategy<Value = Vec<(String, MetaValue)>> {
    (
        prop::option::of(prop::sample::select(vec!["Design", "Audit", "Analysis"])),
        prop::collection::vec(prop::sample::select(vec!["Excel", "Word", "Figma"]), 0..3),
    )
        .prop_map(|(work_type, apps)| {
            let mut meta = Vec::new();
            if let Some(work_type) = work_type {
                meta.push(("work_type".to_string(), MetaValue::scalar(work_type)));
            }
            if !apps.is_empty() {
                meta.push(("apps".to_string(), MetaValue::list(apps)));
            }
            meta
        })
}

/// Strategy for generating valid record drafts under the fixture schema.
pub fn draft_strategy() -> impl Strategy<Value = RecordDraft> {
    (
        title_strategy(),
        creator_strategy(),
        prop::option::of("[a-z ]{1,40}"),
        any::<bool>(),
        window_strategy(),
        fixture_meta_strategy(),
    )
        .prop_map(|(title, creator, description, public, (start, end), meta)| {
            let mut draft = RecordDraft::new(title, creator).public(public);
            draft.description = description.filter(|d| !d.trim().is_empty());
            draft.time_start = start;
            draft.time_end = end;
            for (field, value) in meta {
                draft = draft.meta(field, value);
            }
            draft
        })
}

/// Strategy for words used in search queries.
pub fn query_word_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{2,6}").expect("Invalid regex")
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
