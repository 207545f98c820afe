//! # Work-ID Testkit
//!
//! Test utilities for Work-ID.
//!
//! This crate provides:
//! - Store fixtures over in-memory and file backends
//! - A fault-injecting backend for storage error paths
//! - Property-based test generators using proptest
//! - Concurrency stress helpers
//!
//! ## Usage
//!
//! ```rust
//! use workid_testkit::prelude::*;
//! use workid_core::RecordDraft;
//!
//! with_memory_store(|store| {
//!     let record = store.create(RecordDraft::new("Alpha", "ana")).unwrap();
//!     assert!(store.exists(&record.id).unwrap());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
