//! CLI command implementations.

pub mod maintenance;
pub mod query;
pub mod records;

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use workid_core::{
    parse_instant, Config, CoreError, FieldSpec, MetaValue, RecordStore, SchemaProvider,
    StaticSchema, ValidationError,
};
use workid_storage::{FileBackend, StorageError};

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Store operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Opening or compacting the store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Output or `--json` input could not be processed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Arguments are incomplete or malformed.
    #[error("{0}")]
    Usage(&'static str),

    /// A `--meta` argument is not `key=value`.
    #[error("--meta expects key=value, got `{0}`")]
    BadMeta(String),
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        Self::Core(err.into())
    }
}

/// Result type for CLI commands.
pub type CliResult<T = ()> = Result<T, CliError>;

/// Arguments shared by `create` and `update`.
#[derive(Args, Debug, Default)]
pub struct EditArgs {
    /// Description text
    #[arg(short, long)]
    pub description: Option<String>,

    /// Start instant (RFC 3339, `YYYY-MM-DD[THH:MM]` in UTC, or unix seconds); empty clears
    #[arg(long)]
    pub start: Option<String>,

    /// End instant; same forms as --start
    #[arg(long)]
    pub end: Option<String>,

    /// Mark the record active or inactive (true or false)
    #[arg(long)]
    pub active: Option<bool>,

    /// Meta field value as key=value; repeat for multi-valued fields
    #[arg(short, long, value_name = "KEY=VALUE")]
    pub meta: Vec<String>,

    /// JSON object with record fields, applied before the other flags
    #[arg(long, value_name = "JSON")]
    pub json: Option<String>,
}

/// An opened store plus the concrete backend for maintenance commands.
pub struct Session {
    /// The record store.
    pub store: RecordStore,
    /// The journaled backend under the store.
    pub backend: Arc<FileBackend>,
    fields: Vec<FieldSpec>,
}

impl Session {
    /// Opens the store at `path`, reading settings from the environment.
    pub fn open(path: &Path) -> CliResult<Self> {
        let config = Config::from_env_vars(std::env::vars())?;
        let schema = StaticSchema::from_env_vars(std::env::vars())?;
        let fields = schema.list_fields();
        let backend = Arc::new(FileBackend::open(path)?);
        let store = RecordStore::new(backend.clone(), Arc::new(schema), config)?;
        tracing::debug!(path = %path.display(), fields = fields.len(), "store opened");
        Ok(Self {
            store,
            backend,
            fields,
        })
    }

    /// Declared meta fields.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Folds `key=value` arguments into meta values, using the schema to
    /// decide between scalar and list. Unknown keys stay scalar and are
    /// dropped by the store.
    pub fn meta_from_args(&self, args: &[String]) -> CliResult<BTreeMap<String, MetaValue>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for arg in args {
            let (key, value) = arg
                .split_once('=')
                .ok_or_else(|| CliError::BadMeta(arg.clone()))?;
            grouped
                .entry(key.trim().to_string())
                .or_default()
                .push(value.to_string());
        }
        Ok(grouped
            .into_iter()
            .map(|(key, mut values)| {
                let multiple = self
                    .fields
                    .iter()
                    .any(|field| field.field_id == key && field.multiple);
                let value = if multiple {
                    MetaValue::List(values)
                } else {
                    MetaValue::Scalar(values.pop().unwrap_or_default())
                };
                (key, value)
            })
            .collect())
    }
}

/// Parses an optional instant argument; an empty string means "none".
pub fn instant_arg(value: Option<&str>) -> CliResult<Option<Option<DateTime<Utc>>>> {
    match value {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(Some(None)),
        Some(text) => Ok(Some(Some(parse_instant(text)?))),
    }
}

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
