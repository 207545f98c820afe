//! Decoding drafts and patches from loosely typed JSON request bodies.

use super::meta::MetaValue;
use super::patch::RecordPatch;
use super::record::{RecordDraft, RESERVED_FIELDS};
use super::time::parse_instant;
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

type Object = Map<String, Value>;

impl RecordDraft {
    /// Decodes a create request body.
    ///
    /// Non-reserved keys become meta candidates; the store later keeps only
    /// those the schema declares. `created_at`, `changed_at` and `version`
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidField`] when a key has an unusable
    /// type, or [`ValidationError::InvalidTimestamp`] for a bad instant.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let object = as_object(body)?;
        Ok(Self {
            id: opt_string(object, "id")?.filter(|id| !id.trim().is_empty()),
            title: opt_string(object, "title")?.unwrap_or_default(),
            description: opt_string(object, "description")?,
            creator_id: opt_string(object, "creator_id")?.unwrap_or_default(),
            active: opt_flag(object, "active")?,
            public: opt_flag(object, "public")?,
            time_start: opt_instant(object, "time_start")?.flatten(),
            time_end: opt_instant(object, "time_end")?.flatten(),
            meta: meta_entries(object)?,
        })
    }
}

impl RecordPatch {
    /// Decodes an update request body.
    ///
    /// `id`, `creator_id`, `created_at`, `changed_at` and `version` are
    /// silently ignored. A `null` clears `description`, `time_start` or
    /// `time_end`; an empty string leaves a time untouched. An
    /// `expected_version` key sets the optimistic version check.
    ///
    /// # Errors
    ///
    /// Same as [`RecordDraft::from_json`].
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let object = as_object(body)?;
        let description = match object.get("description") {
            None => None,
            Some(Value::Null) => Some(None),
            Some(Value::String(text)) => Some(Some(text.clone())),
            Some(_) => return Err(invalid("description", "a string or null")),
        };
        let expected_version = match object.get("expected_version") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_u64()
                    .ok_or_else(|| invalid("expected_version", "a non-negative integer"))?,
            ),
        };
        Ok(Self {
            title: opt_string(object, "title")?,
            description,
            active: opt_flag(object, "active")?,
            public: opt_flag(object, "public")?,
            time_start: opt_instant(object, "time_start")?,
            time_end: opt_instant(object, "time_end")?,
            meta: meta_entries(object)?,
            expected_version,
        })
    }
}

fn invalid(field: &str, expected: &'static str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        expected,
    }
}

fn as_object(body: &Value) -> Result<&Object, ValidationError> {
    body.as_object().ok_or_else(|| invalid("body", "a JSON object"))
}

fn opt_string(object: &Object, key: &str) -> Result<Option<String>, ValidationError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(invalid(key, "a string")),
    }
}

fn opt_flag(object: &Object, key: &str) -> Result<Option<bool>, ValidationError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "1" | "yes" => Ok(Some(true)),
            "false" | "off" | "0" | "no" | "" => Ok(Some(false)),
            _ => Err(invalid(key, "a boolean")),
        },
        Some(_) => Err(invalid(key, "a boolean")),
    }
}

/// `None` = key absent or empty string, `Some(None)` = explicit null.
fn opt_instant(
    object: &Object,
    key: &str,
) -> Result<Option<Option<DateTime<Utc>>>, ValidationError> {
    match object.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => parse_instant(text).map(|t| Some(Some(t))),
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
            .map(|t| Some(Some(t)))
            .ok_or_else(|| ValidationError::InvalidTimestamp(number.to_string())),
        Some(_) => Err(invalid(key, "a timestamp string or unix seconds")),
    }
}

fn meta_entries(object: &Object) -> Result<BTreeMap<String, MetaValue>, ValidationError> {
    let mut meta = BTreeMap::new();
    for (key, value) in object {
        if RESERVED_FIELDS.contains(&key.as_str()) || key == "expected_version" {
            continue;
        }
        let value = match value {
            Value::Null => MetaValue::scalar(""),
            Value::String(text) => MetaValue::scalar(text.as_str()),
            Value::Array(items) => MetaValue::List(
                items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| invalid(key, "a string or a list of strings"))
                    })
                    .collect::<Result<_, _>>()?,
            ),
            _ => return Err(invalid(key, "a string or a list of strings")),
        };
        meta.insert(key.clone(), value);
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn draft_from_form_body() {
        let draft = RecordDraft::from_json(&json!({
            "title": "Inventory",
            "creator_id": "ana@example.org",
            "active": "on",
            "time_start": "2024-05-01T09:00:00+02:00",
            "time_end": "",
            "work_type": "Audit",
            "apps": ["Excel", "Word"],
            "created_at": "2000-01-01"
        }))
        .unwrap();

        assert_eq!(draft.title, "Inventory");
        assert_eq!(draft.active, Some(true));
        assert_eq!(
            draft.time_start,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap())
        );
        assert!(draft.time_end.is_none());
        assert_eq!(draft.meta["work_type"], MetaValue::scalar("Audit"));
        assert_eq!(draft.meta["apps"], MetaValue::list(["Excel", "Word"]));
        assert!(!draft.meta.contains_key("created_at"));
    }

    #[test]
    fn patch_ignores_immutable_keys() {
        let patch = RecordPatch::from_json(&json!({
            "id": "OTHER",
            "creator_id": "mallory",
            "created_at": "2000-01-01",
            "title": "Renamed"
        }))
        .unwrap();

        assert_eq!(patch.title.as_deref(), Some("Renamed"));
        assert!(patch.meta.is_empty());
    }

    #[test]
    fn patch_null_clears_and_empty_string_keeps() {
        let patch = RecordPatch::from_json(&json!({
            "description": null,
            "time_start": null,
            "time_end": "",
            "expected_version": 4
        }))
        .unwrap();

        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.time_start, Some(None));
        assert_eq!(patch.time_end, None);
        assert_eq!(patch.expected_version, Some(4));
    }

    #[test]
    fn type_errors_name_the_field() {
        let err = RecordDraft::from_json(&json!({"title": 7})).unwrap_err();
        assert_eq!(err, invalid("title", "a string"));

        let err = RecordPatch::from_json(&json!({"apps": [1, 2]})).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { ref field, .. } if field == "apps"));

        assert!(RecordDraft::from_json(&json!([1])).is_err());
        assert!(matches!(
            RecordDraft::from_json(&json!({"time_start": "soon"})),
            Err(ValidationError::InvalidTimestamp(_))
        ));
    }
}
