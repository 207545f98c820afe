//! Schema and store maintenance commands.

use super::{print_json, CliResult, Session};
use serde_json::json;
use tracing::info;
use workid_storage::KvBackend;

/// Prints the declared meta fields.
pub fn fields(session: &Session) -> CliResult {
    print_json(session.fields())
}

/// Repairs the owner index and prints what changed.
pub fn reconcile(session: &Session) -> CliResult {
    let report = session.store.reconcile()?;
    session.backend.sync()?;
    print_json(&report)
}

/// Rewrites the journal so it holds one entry per live key.
pub fn compact(session: &Session) -> CliResult {
    let before = session.backend.journal_len();
    session.backend.compact()?;
    let after = session.backend.journal_len();
    info!(before, after, "journal compacted");
    print_json(&json!({
        "records": session.store.count()?,
        "bytes_before": before,
        "bytes_after": after,
    }))
}
