//! # Work-ID Storage
//!
//! Key-value backend trait and implementations for Work-ID.
//!
//! This crate provides the lowest-level persistence abstraction for
//! Work-ID. Backends are **opaque value stores** - they hold byte values
//! and string sets under string keys and do not interpret them.
//!
//! ## Design Principles
//!
//! - Backends expose single-key atomic operations (get, set,
//!   set-if-absent, compare-and-set, delete, set membership, increment)
//!   plus a prefix scan
//! - No knowledge of records, owners, or JSON documents
//! - Must be `Send + Sync` for concurrent access
//! - Work-ID core owns all key naming and payload interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - Journaled persistent storage
//!
//! ## Example
//!
//! ```rust
//! use workid_storage::{InMemoryBackend, KvBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.set("record:AB12-CD34", b"{\"title\":\"hello\"}").unwrap();
//! backend.set_add("ownerindex:ana@example.org", "AB12-CD34").unwrap();
//! assert_eq!(
//!     backend.set_members("ownerindex:ana@example.org").unwrap(),
//!     vec!["AB12-CD34"]
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod journal;
mod keyspace;
mod memory;

pub use backend::KvBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
