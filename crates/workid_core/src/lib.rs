//! # Work-ID Core
//!
//! Record store for Work-ID.
//!
//! This crate provides:
//! - Human-typeable id generation with mandatory collision checks
//! - Record CRUD with validation, timestamp management and ownership checks
//! - An owner index kept next to the primary entries, with a repair pass
//! - Owner and visibility scoped listing with pagination
//! - Quote-aware, case-insensitive AND search across every record field
//!
//! Persistence goes through [`workid_storage::KvBackend`]; the set of
//! meta fields comes from a [`SchemaProvider`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use workid_core::{Config, ListQuery, RecordDraft, RecordStore, SearchQuery, StaticSchema};
//! use workid_storage::InMemoryBackend;
//!
//! let schema = StaticSchema::new().single("Work Type", ["Design", "Audit"]);
//! let store = RecordStore::new(
//!     Arc::new(InMemoryBackend::new()),
//!     Arc::new(schema),
//!     Config::default().id_pattern("(XX-XX)"),
//! )
//! .unwrap();
//!
//! store.create(RecordDraft::new("Alpha Report", "ana@example.org")).unwrap();
//! store.create(RecordDraft::new("Beta Report", "ana@example.org")).unwrap();
//!
//! let page = store.list(&ListQuery::owned_by("ana@example.org")).unwrap();
//! assert_eq!(page.total, 2);
//!
//! let hits = store.search(&SearchQuery::new("alpha report")).unwrap();
//! assert_eq!(hits.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod id;
mod model;
mod query;
mod reconcile;
mod schema;
mod store;

pub use config::{Config, IdScheme};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use id::{IdGenerator, IdPattern, ID_ALPHABET};
pub use model::{parse_instant, MetaValue, Record, RecordDraft, RecordPatch, RESERVED_FIELDS};
pub use query::{tokenize, ListQuery, Page, SearchQuery};
pub use reconcile::ReconcileReport;
pub use schema::{check_fields, field_id_for, normalize_meta, FieldSpec, SchemaProvider, StaticSchema};
pub use store::RecordStore;

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
