//! Record and record draft.

use super::meta::MetaValue;
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest accepted client-supplied id.
pub(crate) const MAX_ID_LEN: usize = 128;

/// Field names owned by the record itself. Meta fields may not reuse them.
pub const RESERVED_FIELDS: &[&str] = &[
    "id",
    "title",
    "description",
    "creator_id",
    "active",
    "public",
    "time_start",
    "time_end",
    "created_at",
    "changed_at",
    "version",
];

/// A persisted work record.
///
/// Stored as one flat JSON document per key: core fields at the top level,
/// meta fields flattened next to them, absent optionals omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Unique, immutable identifier.
    pub id: String,
    /// Non-blank title.
    pub title: String,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning identity. Immutable after creation.
    pub creator_id: String,
    /// Whether the work is still active.
    pub active: bool,
    /// Whether non-owners may discover the record.
    pub public: bool,
    /// Start of the work window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<DateTime<Utc>>,
    /// End of the work window; never before `time_start`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<DateTime<Utc>>,
    /// Creation instant. Written once.
    pub created_at: DateTime<Utc>,
    /// Instant of the latest save. Non-decreasing.
    pub changed_at: DateTime<Utc>,
    /// Save counter, starting at 1.
    pub version: u64,
    /// Deployment-configured fields.
    #[serde(flatten)]
    pub meta: BTreeMap<String, MetaValue>,
}

/// Wire shape used for decoding; tolerates documents written without
/// `changed_at` or `version`.
#[derive(Deserialize)]
struct StoredRecord {
    id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    creator_id: String,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default = "default_true")]
    public: bool,
    #[serde(default)]
    time_start: Option<DateTime<Utc>>,
    #[serde(default)]
    time_end: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    changed_at: Option<DateTime<Utc>>,
    #[serde(default = "first_version")]
    version: u64,
    #[serde(flatten)]
    meta: BTreeMap<String, MetaValue>,
}

fn default_true() -> bool {
    true
}

fn first_version() -> u64 {
    1
}

impl From<StoredRecord> for Record {
    fn from(stored: StoredRecord) -> Self {
        Self {
            changed_at: stored.changed_at.unwrap_or(stored.created_at),
            id: stored.id,
            title: stored.title,
            description: stored.description,
            creator_id: stored.creator_id,
            active: stored.active,
            public: stored.public,
            time_start: stored.time_start,
            time_end: stored.time_end,
            created_at: stored.created_at,
            version: stored.version,
            meta: stored.meta,
        }
    }
}

impl Record {
    /// Encodes the record as its canonical JSON document.
    pub(crate) fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decodes a canonical JSON document.
    pub(crate) fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice::<StoredRecord>(bytes).map(Self::from)
    }

    /// Checks the record invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_id(&self.id)?;
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if self.creator_id.trim().is_empty() {
            return Err(ValidationError::MissingCreator);
        }
        check_time_range(self.time_start, self.time_end)
    }

    /// Returns true if `identity` may see this record in a visibility listing.
    #[must_use]
    pub fn is_visible_to(&self, identity: Option<&str>) -> bool {
        self.public || identity == Some(self.creator_id.as_str())
    }

    /// Builds the case-folded text searched by free-text queries.
    ///
    /// Fields are separated by a NUL so a term never matches across two
    /// adjacent fields. List-valued meta fields contribute every element.
    #[must_use]
    pub fn search_corpus(&self) -> String {
        let mut parts: Vec<&str> = vec![self.title.as_str()];
        if let Some(description) = &self.description {
            parts.push(description);
        }
        parts.push(&self.id);
        parts.push(&self.creator_id);
        for value in self.meta.values() {
            parts.extend(value.values());
        }
        parts.join("\0").to_lowercase()
    }
}

/// Input for creating a record.
///
/// ```rust
/// use workid_core::{MetaValue, RecordDraft};
///
/// let draft = RecordDraft::new("Quarterly report", "ana@example.org")
///     .description("Numbers for Q3")
///     .public(false)
///     .meta("work_type", MetaValue::scalar("Analysis"));
/// assert_eq!(draft.title, "Quarterly report");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    /// Client-chosen id; generated when `None`.
    pub id: Option<String>,
    /// Title (required).
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Owning identity (required).
    pub creator_id: String,
    /// Defaults to `true`.
    pub active: Option<bool>,
    /// Defaults to the store's configured visibility.
    pub public: Option<bool>,
    /// Start of the work window.
    pub time_start: Option<DateTime<Utc>>,
    /// End of the work window.
    pub time_end: Option<DateTime<Utc>>,
    /// Meta field values, filtered against the schema on create.
    pub meta: BTreeMap<String, MetaValue>,
}

impl RecordDraft {
    /// Creates a draft with the two required fields.
    pub fn new(title: impl Into<String>, creator_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            creator_id: creator_id.into(),
            ..Self::default()
        }
    }

    /// Requests a specific id instead of a generated one.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
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

    /// Sets the start instant.
    #[must_use]
    pub fn time_start(mut self, start: DateTime<Utc>) -> Self {
        self.time_start = Some(start);
        self
    }

    /// Sets the end instant.
    #[must_use]
    pub fn time_end(mut self, end: DateTime<Utc>) -> Self {
        self.time_end = Some(end);
        self
    }

    /// Sets one meta field.
    #[must_use]
    pub fn meta(mut self, field: impl Into<String>, value: MetaValue) -> Self {
        self.meta.insert(field.into(), value);
        self
    }

    /// Checks the draft's own invariants (not id uniqueness, not meta arity).
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(id) = &self.id {
            validate_id(id)?;
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if self.creator_id.trim().is_empty() {
            return Err(ValidationError::MissingCreator);
        }
        check_time_range(self.time_start, self.time_end)
    }
}

/// Checks that `id` is usable as a key segment.
pub(crate) fn validate_id(id: &str) -> Result<(), ValidationError> {
    let usable = !id.is_empty()
        && id.chars().count() <= MAX_ID_LEN
        && !id.contains(':')
        && !id.contains(char::is_whitespace)
        && !id.contains(char::is_control);
    if usable {
        Ok(())
    } else {
        Err(ValidationError::InvalidId(id.to_string()))
    }
}

fn check_time_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err(ValidationError::TimeRangeInverted { start, end })
        }
        _ => Ok(()),
    }
}

/// Trims a string, mapping blank input to `None`.
pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
