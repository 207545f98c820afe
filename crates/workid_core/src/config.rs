//! Record store configuration.

use crate::error::{CoreError, CoreResult};

/// How new record ids are produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdScheme {
    /// Random ids shaped by a pattern such as `XXXX-XXXX`.
    Pattern {
        /// Template of literal characters and placeholders.
        pattern: String,
        /// The character marking a placeholder position.
        placeholder: char,
        /// Whether the first placeholder draws from letters only.
        letter_first: bool,
    },
    /// Decimal ids from an atomic counter in the backing store.
    Sequence {
        /// Key of the counter.
        counter_key: String,
        /// Minimum width; shorter numbers are zero-padded.
        width: usize,
    },
}

impl Default for IdScheme {
    fn default() -> Self {
        Self::Pattern {
            pattern: "XXXX-XXXX".to_string(),
            placeholder: 'X',
            letter_first: false,
        }
    }
}

/// Configuration for a [`RecordStore`](crate::RecordStore).
#[derive(Debug, Clone)]
pub struct Config {
    /// Key prefix for primary record entries (`{prefix}:{id}`).
    pub record_prefix: String,

    /// Key prefix for owner index sets (`{prefix}:{creator_id}`).
    pub owner_index_prefix: String,

    /// Id generation scheme.
    pub id_scheme: IdScheme,

    /// Maximum candidates tried before giving up on id generation.
    pub max_id_attempts: u32,

    /// Maximum read-merge-write rounds for an update under contention.
    pub max_update_attempts: u32,

    /// Visibility given to records created without an explicit `public` flag.
    pub default_public: bool,

    /// Page size used when a caller does not specify one.
    pub default_per_page: usize,

    /// Upper bound for requested page sizes.
    pub max_per_page: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            record_prefix: "record".to_string(),
            owner_index_prefix: "ownerindex".to_string(),
            id_scheme: IdScheme::default(),
            max_id_attempts: 64,
            max_update_attempts: 16,
            default_public: true,
            default_per_page: 10,
            max_per_page: 100,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the record key prefix (e.g. `work` or `contact`).
    #[must_use]
    pub fn record_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.record_prefix = prefix.into();
        self
    }

    /// Sets the owner index key prefix.
    #[must_use]
    pub fn owner_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.owner_index_prefix = prefix.into();
        self
    }

    /// Uses random pattern ids with `X` placeholders.
    #[must_use]
    pub fn id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.id_scheme = IdScheme::Pattern {
            pattern: pattern.into(),
            placeholder: 'X',
            letter_first: false,
        };
        self
    }

    /// Sets the id scheme.
    #[must_use]
    pub fn id_scheme(mut self, scheme: IdScheme) -> Self {
        self.id_scheme = scheme;
        self
    }

    /// Sets the id generation retry budget.
    #[must_use]
    pub const fn max_id_attempts(mut self, attempts: u32) -> Self {
        self.max_id_attempts = attempts;
        self
    }

    /// Sets the update retry budget.
    #[must_use]
    pub const fn max_update_attempts(mut self, attempts: u32) -> Self {
        self.max_update_attempts = attempts;
        self
    }

    /// Sets the default visibility of new records.
    #[must_use]
    pub const fn default_public(mut self, value: bool) -> Self {
        self.default_public = value;
        self
    }

    /// Sets the default page size.
    #[must_use]
    pub const fn default_per_page(mut self, per_page: usize) -> Self {
        self.default_per_page = per_page;
        self
    }

    /// Sets the maximum page size.
    #[must_use]
    pub const fn max_per_page(mut self, per_page: usize) -> Self {
        self.max_per_page = per_page;
        self
    }

    /// Applies deployment settings from environment-style variables.
    ///
    /// Recognized keys: `WORK_ID_PATTERN`, `RECORD_PREFIX`,
    /// `OWNER_INDEX_PREFIX`, `DEFAULT_PUBLIC`, `PER_PAGE`. Other keys are
    /// ignored, so `std::env::vars()` can be passed directly.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a recognized value does not parse.
    pub fn from_env_vars<I, K, V>(vars: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                "WORK_ID_PATTERN" => config = config.id_pattern(value),
                "RECORD_PREFIX" => config = config.record_prefix(value),
                "OWNER_INDEX_PREFIX" => config = config.owner_index_prefix(value),
                "DEFAULT_PUBLIC" => config.default_public = parse_flag("DEFAULT_PUBLIC", value)?,
                "PER_PAGE" => {
                    config.default_per_page = value.parse().map_err(|_| {
                        CoreError::config(format!("PER_PAGE must be a positive integer, got `{value}`"))
                    })?;
                }
                _ => {}
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first problem found.
    pub fn validate(&self) -> CoreResult<()> {
        for (name, prefix) in [
            ("record_prefix", &self.record_prefix),
            ("owner_index_prefix", &self.owner_index_prefix),
        ] {
            if prefix.is_empty() || prefix.contains(':') || prefix.contains(char::is_whitespace) {
                return Err(CoreError::config(format!(
                    "{name} must be non-empty without ':' or whitespace, got `{prefix}`"
                )));
            }
        }
        if self.record_prefix == self.owner_index_prefix {
            return Err(CoreError::config(
                "record_prefix and owner_index_prefix must differ",
            ));
        }
        if let IdScheme::Sequence { counter_key, .. } = &self.id_scheme {
            if counter_key.starts_with(&format!("{}:", self.record_prefix)) {
                return Err(CoreError::config(format!(
                    "counter key `{counter_key}` must not live under the record prefix"
                )));
            }
        }
        if self.max_id_attempts == 0 || self.max_update_attempts == 0 {
            return Err(CoreError::config("retry budgets must be at least 1"));
        }
        if self.default_per_page == 0 || self.max_per_page == 0 {
            return Err(CoreError::config("page sizes must be at least 1"));
        }
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> CoreResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CoreError::config(format!(
            "{name} must be a boolean, got `{other}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.record_prefix, "record");
        assert_eq!(config.owner_index_prefix, "ownerindex");
        assert!(config.default_public);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .record_prefix("work")
            .id_pattern("(XX-XX)")
            .default_public(false)
            .max_id_attempts(8);

        assert_eq!(config.record_prefix, "work");
        assert!(!config.default_public);
        assert_eq!(config.max_id_attempts, 8);
        assert!(matches!(
            config.id_scheme,
            IdScheme::Pattern { ref pattern, .. } if pattern == "(XX-XX)"
        ));
    }

    #[test]
    fn env_vars_override_defaults() {
        let config = Config::from_env_vars([
            ("WORK_ID_PATTERN", "XXX-XXX"),
            ("RECORD_PREFIX", "contact"),
            ("DEFAULT_PUBLIC", "false"),
            ("PER_PAGE", "25"),
            ("UNRELATED", "ignored"),
        ])
        .unwrap();

        assert_eq!(config.record_prefix, "contact");
        assert!(!config.default_public);
        assert_eq!(config.default_per_page, 25);
    }

    #[test]
    fn env_vars_reject_garbage() {
        assert!(matches!(
            Config::from_env_vars([("DEFAULT_PUBLIC", "maybe")]),
            Err(CoreError::Config(_))
        ));
        assert!(matches!(
            Config::from_env_vars([("PER_PAGE", "0")]),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn prefixes_must_be_distinct_and_clean() {
        assert!(Config::new().record_prefix("a:b").validate().is_err());
        assert!(Config::new()
            .record_prefix("x")
            .owner_index_prefix("x")
            .validate()
            .is_err());
    }

    #[test]
    fn counter_key_outside_record_namespace() {
        let config = Config::new().id_scheme(IdScheme::Sequence {
            counter_key: "record:counter".to_string(),
            width: 0,
        });
        assert!(config.validate().is_err());
    }
}
