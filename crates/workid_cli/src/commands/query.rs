//! Listing and search commands.

use super::{print_json, CliError, CliResult, Session};
use workid_core::{ListQuery, SearchQuery};

/// Lists records visible to `actor`, or only theirs with `mine`.
pub fn list(
    session: &Session,
    actor: Option<&str>,
    mine: bool,
    page: usize,
    per_page: Option<usize>,
) -> CliResult {
    let query = ListQuery {
        owner: scope_owner(actor, mine)?,
        include_visible: !mine,
        page,
        per_page,
    };
    let page = session.store.list(&query)?;
    print_json(&page)
}

/// Searches records visible to `actor`, or only theirs with `mine`.
pub fn search(
    session: &Session,
    actor: Option<&str>,
    text: String,
    mine: bool,
    limit: Option<usize>,
) -> CliResult {
    let query = SearchQuery {
        text,
        owner: scope_owner(actor, mine)?,
        include_visible: !mine,
        limit,
    };
    let records = session.store.search(&query)?;
    print_json(&records)
}

fn scope_owner(actor: Option<&str>, mine: bool) -> CliResult<Option<String>> {
    match (actor, mine) {
        (None, true) => Err(CliError::Usage("--mine needs --as <creator>")),
        (actor, _) => Ok(actor.map(str::to_string)),
    }
}
