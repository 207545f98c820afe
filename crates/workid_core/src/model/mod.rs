//! Record model.
//!
//! # Invariants
//! - Every persisted record has a non-blank `title` and `creator_id`.
//! - `time_end >= time_start` when both are present.
//! - All instants are held as UTC, whatever offset the client supplied.
//! - `meta` only holds non-empty values; a single-valued field holds a
//!   scalar and a multi-valued field holds a list.

mod json;
mod meta;
mod patch;
mod record;
mod time;

pub use meta::MetaValue;
pub use patch::RecordPatch;
pub use record::{Record, RecordDraft, RESERVED_FIELDS};
pub(crate) use record::{non_blank, validate_id, MAX_ID_LEN};
pub use time::parse_instant;
