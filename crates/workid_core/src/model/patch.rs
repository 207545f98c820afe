//! Partial updates.

use super::meta::MetaValue;
use super::record::{non_blank, Record};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A partial update to a [`Record`].
///
/// `None` leaves a field untouched. The clearable fields use a nested
/// option: `Some(None)` removes the stored value. `meta` merges key by
/// key; a key mapped to an empty value removes that key.
///
/// `id`, `creator_id` and `created_at` have no setter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    /// New title.
    pub title: Option<String>,
    /// New description, or `Some(None)` to clear it.
    pub description: Option<Option<String>>,
    /// New active flag.
    pub active: Option<bool>,
    /// New visibility flag.
    pub public: Option<bool>,
    /// New start instant, or `Some(None)` to clear it.
    pub time_start: Option<Option<DateTime<Utc>>>,
    /// New end instant, or `Some(None)` to clear it.
    pub time_end: Option<Option<DateTime<Utc>>>,
    /// Meta fields to merge.
    pub meta: BTreeMap<String, MetaValue>,
    /// If set, the update fails with a conflict unless the stored record
    /// has exactly this version.
    pub expected_version: Option<u64>,
}

impl RecordPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    /// Clears the description.
    #[must_use]
    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    /// Sets the active flag.
    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Sets the visibility flag.
    #[must_use]
    pub fn public(mut self, public: bool) -> Self {
        self.public = Some(public);
        self
    }

    /// Sets or clears the start instant.
    #[must_use]
    pub fn time_start(mut self, start: Option<DateTime<Utc>>) -> Self {
        self.time_start = Some(start);
        self
    }

    /// Sets or clears the end instant.
    #[must_use]
    pub fn time_end(mut self, end: Option<DateTime<Utc>>) -> Self {
        self.time_end = Some(end);
        self
    }

    /// Merges one meta field. An empty value removes the field.
    #[must_use]
    pub fn meta(mut self, field: impl Into<String>, value: MetaValue) -> Self {
        self.meta.insert(field.into(), value);
        self
    }

    /// Requires the stored record to be at `version`.
    #[must_use]
    pub const fn expect_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.active.is_none()
            && self.public.is_none()
            && self.time_start.is_none()
            && self.time_end.is_none()
            && self.meta.is_empty()
    }

    /// Merges the patch into `record`.
    ///
    /// Does not validate and does not touch bookkeeping fields; the store
    /// does both after merging.
    pub(crate) fn apply_to(&self, record: &mut Record) {
        if let Some(title) = &self.title {
            record.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            record.description = description.as_deref().and_then(non_blank);
        }
        if let Some(active) = self.active {
            record.active = active;
        }
        if let Some(public) = self.public {
            record.public = public;
        }
        if let Some(start) = self.time_start {
            record.time_start = start;
        }
        if let Some(end) = self.time_end {
            record.time_end = end;
        }
        for (field, value) in &self.meta {
            if value.is_empty() {
                record.meta.remove(field);
            } else {
                record.meta.insert(field.clone(), value.normalized());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> Record {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Record {
            id: "ID".to_string(),
            title: "Old".to_string(),
            description: Some("desc".to_string()),
            creator_id: "ana".to_string(),
            active: true,
            public: true,
            time_start: Some(created),
            time_end: None,
            created_at: created,
            changed_at: created,
            version: 1,
            meta: BTreeMap::from([
                ("color".to_string(), MetaValue::scalar("red")),
                ("apps".to_string(), MetaValue::list(["Excel"])),
            ]),
        }
    }

    #[test]
    fn untouched_fields_survive() {
        let mut target = record();
        RecordPatch::new().title("  New ").apply_to(&mut target);
        assert_eq!(target.title, "New");
        assert_eq!(target.description.as_deref(), Some("desc"));
        assert!(target.time_start.is_some());
        assert_eq!(target.meta.len(), 2);
    }

    #[test]
    fn clearable_fields() {
        let mut target = record();
        RecordPatch::new()
            .clear_description()
            .time_start(None)
            .apply_to(&mut target);
        assert!(target.description.is_none());
        assert!(target.time_start.is_none());

        let mut target = record();
        RecordPatch::new().description("   ").apply_to(&mut target);
        assert!(target.description.is_none());
    }

    #[test]
    fn meta_merges_key_by_key() {
        let mut target = record();
        RecordPatch::new()
            .meta("apps", MetaValue::list(["Word", " "]))
            .meta("color", MetaValue::scalar(""))
            .meta("size", MetaValue::scalar("L"))
            .apply_to(&mut target);

        assert_eq!(target.meta.get("apps"), Some(&MetaValue::list(["Word"])));
        assert!(!target.meta.contains_key("color"));
        assert_eq!(target.meta.get("size"), Some(&MetaValue::scalar("L")));
    }

    #[test]
    fn emptiness() {
        assert!(RecordPatch::new().is_empty());
        assert!(RecordPatch::new().expect_version(3).is_empty());
        assert!(!RecordPatch::new().public(false).is_empty());
    }
}
