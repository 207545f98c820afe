//! Meta field schema.
//!
//! The set of meta fields is decided by the deployment, not by the store.
//! A [`SchemaProvider`] hands the store the declared fields; the store
//! keeps only values for those fields and checks their arity.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::model::{MetaValue, RESERVED_FIELDS};
use serde::Serialize;
use std::collections::BTreeMap;

/// Declaration of one meta field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Key under which values are stored.
    pub field_id: String,
    /// Human-readable name.
    pub label: String,
    /// Suggested values. Display hints only.
    pub options: Vec<String>,
    /// Whether the field holds a list of values.
    pub multiple: bool,
    /// Display position.
    pub order: usize,
}

/// Source of meta field declarations.
pub trait SchemaProvider: Send + Sync {
    /// Returns all declared fields.
    fn list_fields(&self) -> Vec<FieldSpec>;
}

/// A fixed, in-memory schema.
///
/// ```rust
/// use workid_core::{SchemaProvider, StaticSchema};
///
/// let schema = StaticSchema::new()
///     .single("Work Type", ["Design", "Audit"])
///     .multi("Apps", ["Excel", "Word"]);
/// let fields = schema.list_fields();
/// assert_eq!(fields[0].field_id, "work_type");
/// assert!(fields[1].multiple);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    fields: Vec<FieldSpec>,
}

impl StaticSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a single-valued field.
    ///
    /// A label whose id shadows a record field (`Title`, `Created At`)
    /// is accepted here and rejected by [`StaticSchema::validate`] and
    /// by `RecordStore::new`.
    #[must_use]
    pub fn single<I, S>(self, label: &str, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(label, options, false)
    }

    /// Declares a multi-valued field.
    #[must_use]
    pub fn multi<I, S>(self, label: &str, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(label, options, true)
    }

    fn push<I, S>(mut self, label: &str, options: I, multiple: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let label = label.trim();
        let field_id = field_id_for(label);
        self.fields.retain(|f| f.field_id != field_id);
        let order = self.fields.len();
        self.fields.push(FieldSpec {
            field_id,
            label: label.to_string(),
            options: options.into_iter().map(Into::into).collect(),
            multiple,
            order,
        });
        self
    }

    /// Builds a schema from `META_SEL_*` and `META_MSEL_*` variables.
    ///
    /// Each value has the form `Label:opt1,opt2`. `SEL` declares a
    /// single-valued field and `MSEL` a multi-valued one. Values without a
    /// `:` are skipped. Fields are ordered by variable name.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a derived field id collides with a record field
    /// or with another declared field.
    pub fn from_env_vars<I, K, V>(vars: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut declared: Vec<(String, bool, String)> = vars
            .into_iter()
            .filter_map(|(key, value)| {
                let key = key.as_ref();
                let multiple = if key.starts_with("META_MSEL_") {
                    true
                } else if key.starts_with("META_SEL_") {
                    false
                } else {
                    return None;
                };
                Some((key.to_string(), multiple, value.as_ref().to_string()))
            })
            .collect();
        declared.sort_by(|a, b| a.0.cmp(&b.0));

        let mut schema = Self::new();
        for (key, multiple, value) in declared {
            let Some((label, options)) = value.split_once(':') else {
                tracing::warn!(variable = %key, "meta field declaration has no ':', skipping");
                continue;
            };
            let field_id = field_id_for(label.trim());
            if schema.fields.iter().any(|f| f.field_id == field_id) {
                return Err(CoreError::config(format!(
                    "{key} declares meta field `{field_id}` twice"
                )));
            }
            let options: Vec<String> = options
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
            schema = schema.push(label, options, multiple);
        }
        schema.validate()?;
        Ok(schema)
    }

    /// Checks that no field id is empty, repeated or shadows a record field.
    ///
    /// # Errors
    ///
    /// Returns `Config` naming the offending field.
    pub fn validate(&self) -> CoreResult<()> {
        check_fields(&self.fields)
    }
}

impl SchemaProvider for StaticSchema {
    fn list_fields(&self) -> Vec<FieldSpec> {
        self.fields.clone()
    }
}

fn shadows_record_field(field_id: &str) -> bool {
    RESERVED_FIELDS.contains(&field_id) || field_id == "expected_version"
}

/// Checks a list of field declarations before a store accepts it.
///
/// Meta values are flattened next to the record fields when stored, so a
/// field id equal to a record field would make the document undecodable.
///
/// # Errors
///
/// Returns `Config` for an empty, duplicated or shadowing field id.
pub fn check_fields(fields: &[FieldSpec]) -> CoreResult<()> {
    let mut seen = std::collections::BTreeSet::new();
    for field in fields {
        if field.field_id.is_empty() {
            return Err(CoreError::config("meta field label must not be empty"));
        }
        if shadows_record_field(&field.field_id) {
            return Err(CoreError::config(format!(
                "meta field `{}` collides with a record field",
                field.field_id
            )));
        }
        if !seen.insert(field.field_id.as_str()) {
            return Err(CoreError::config(format!(
                "meta field `{}` is declared twice",
                field.field_id
            )));
        }
    }
    Ok(())
}

/// Derives a field id from a label: lower-cased, spaces become `_`.
#[must_use]
pub fn field_id_for(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

/// Filters and checks meta values against the declared fields.
///
/// Unknown fields and empty values are dropped, values are trimmed.
/// Fields shadowing a record field are never kept.
///
/// # Errors
///
/// Returns [`ValidationError::MetaArity`] when a single-valued field gets
/// a list or a multi-valued field gets a scalar.
pub fn normalize_meta(
    fields: &[FieldSpec],
    meta: &BTreeMap<String, MetaValue>,
) -> Result<BTreeMap<String, MetaValue>, ValidationError> {
    let mut normalized = BTreeMap::new();
    for field in fields {
        if shadows_record_field(&field.field_id) {
            tracing::warn!(field = %field.field_id, "meta field shadows a record field, dropping");
            continue;
        }
        let Some(value) = meta.get(&field.field_id) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        match (value, field.multiple) {
            (MetaValue::Scalar(_), false) | (MetaValue::List(_), true) => {
                normalized.insert(field.field_id.clone(), value.normalized());
            }
            (MetaValue::List(_), false) => {
                return Err(ValidationError::MetaArity {
                    field: field.field_id.clone(),
                    expected: "a single value",
                });
            }
            (MetaValue::Scalar(_), true) => {
                return Err(ValidationError::MetaArity {
                    field: field.field_id.clone(),
                    expected: "a list of values",
                });
            }
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> StaticSchema {
        StaticSchema::new()
            .single("Work Type", ["Design", "Audit"])
            .multi("Apps", ["Excel", "Word"])
    }

    #[test]
    fn env_declarations() {
        let schema = StaticSchema::from_env_vars([
            ("META_MSEL_Apps", "Required Apps: Excel , Word,"),
            ("META_SEL_WorkType", "Work Type:Design,Audit"),
            ("META_SEL_Broken", "no colon here"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap();

        let fields = schema.list_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field_id, "required_apps");
        assert!(fields[0].multiple);
        assert_eq!(fields[0].options, vec!["Excel", "Word"]);
        assert_eq!(fields[0].order, 0);
        assert_eq!(fields[1].field_id, "work_type");
        assert_eq!(fields[1].label, "Work Type");
        assert!(!fields[1].multiple);
    }

    #[test]
    fn reserved_ids_are_rejected() {
        assert!(matches!(
            StaticSchema::from_env_vars([("META_SEL_T", "Title:a,b")]),
            Err(CoreError::Config(_))
        ));
        assert!(StaticSchema::new().single("Created At", ["x"]).validate().is_err());
    }

    #[test]
    fn shadowing_fields_never_reach_the_document() {
        let fields = StaticSchema::new()
            .single("Title", ["a"])
            .single("Work Type", ["Audit"])
            .list_fields();
        assert!(check_fields(&fields).is_err());

        let meta = BTreeMap::from([
            ("title".to_string(), MetaValue::scalar("Shadow")),
            ("work_type".to_string(), MetaValue::scalar("Audit")),
        ]);
        let normalized = normalize_meta(&fields, &meta).unwrap();
        assert_eq!(normalized.keys().collect::<Vec<_>>(), vec!["work_type"]);
    }

    #[test]
    fn duplicate_env_ids_are_rejected() {
        assert!(StaticSchema::from_env_vars([
            ("META_SEL_A", "Color:red"),
            ("META_MSEL_B", "color:blue"),
        ])
        .is_err());
    }

    #[test]
    fn unknown_and_empty_values_are_dropped() {
        let meta = BTreeMap::from([
            ("work_type".to_string(), MetaValue::scalar(" Audit ")),
            ("apps".to_string(), MetaValue::list(["", "  "])),
            ("shoe_size".to_string(), MetaValue::scalar("44")),
        ]);
        let normalized = normalize_meta(&schema().list_fields(), &meta).unwrap();
        assert_eq!(
            normalized,
            BTreeMap::from([("work_type".to_string(), MetaValue::scalar("Audit"))])
        );
    }

    #[test]
    fn options_are_not_enforced() {
        let meta = BTreeMap::from([("work_type".to_string(), MetaValue::scalar("Painting"))]);
        assert!(normalize_meta(&schema().list_fields(), &meta).is_ok());
    }

    #[test]
    fn arity_mismatch() {
        let fields = schema().list_fields();
        let list_for_single =
            BTreeMap::from([("work_type".to_string(), MetaValue::list(["Audit"]))]);
        assert!(matches!(
            normalize_meta(&fields, &list_for_single),
            Err(ValidationError::MetaArity { ref field, .. }) if field == "work_type"
        ));

        let scalar_for_multi = BTreeMap::from([("apps".to_string(), MetaValue::scalar("Word"))]);
        assert!(normalize_meta(&fields, &scalar_for_multi).is_err());
    }
}
