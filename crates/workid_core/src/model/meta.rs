//! Meta field values.

use serde::{Deserialize, Serialize};

/// Value of a deployment-configured meta field.
///
/// Serialized untagged: a scalar is a JSON string, a list is a JSON array
/// of strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    /// Value of a single-select field.
    Scalar(String),
    /// Values of a multi-select field.
    List(Vec<String>),
}

impl MetaValue {
    /// Creates a scalar value.
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    /// Creates a list value.
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// Returns true for an empty string or a list with no non-blank elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(value) => value.trim().is_empty(),
            Self::List(values) => values.iter().all(|v| v.trim().is_empty()),
        }
    }

    /// Returns the value with surrounding whitespace trimmed and blank list
    /// elements dropped.
    #[must_use]
    pub fn normalized(&self) -> Self {
        match self {
            Self::Scalar(value) => Self::Scalar(value.trim().to_string()),
            Self::List(values) => Self::List(
                values
                    .iter()
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }

    /// Iterates over the contained strings (one for a scalar).
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Self::Scalar(value) => std::slice::from_ref(value),
            Self::List(values) => values,
        };
        slice.iter().map(String::as_str)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<String>> for MetaValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_detection() {
        assert!(MetaValue::scalar("  ").is_empty());
        assert!(MetaValue::list(["", " "]).is_empty());
        assert!(MetaValue::List(vec![]).is_empty());
        assert!(!MetaValue::list(["", "x"]).is_empty());
    }

    #[test]
    fn normalized_trims_and_drops_blanks() {
        assert_eq!(
            MetaValue::list([" a ", "", "b"]).normalized(),
            MetaValue::list(["a", "b"])
        );
    }

    #[test]
    fn untagged_json_shape() {
        let scalar: MetaValue = serde_json::from_str("\"Design\"").unwrap();
        assert_eq!(scalar, MetaValue::scalar("Design"));
        let list: MetaValue = serde_json::from_str("[\"Excel\",\"Word\"]").unwrap();
        assert_eq!(list, MetaValue::list(["Excel", "Word"]));
        assert_eq!(serde_json::to_string(&list).unwrap(), "[\"Excel\",\"Word\"]");
    }

    #[test]
    fn values_iterates_scalars_and_lists() {
        assert_eq!(MetaValue::scalar("a").values().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(
            MetaValue::list(["a", "b"]).values().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }
}
