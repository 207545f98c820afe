//! Listing, pagination and free-text search.
//!
//! Both [`RecordStore::list`] and [`RecordStore::search`] pick candidates
//! with the same rule:
//!
//! - `include_visible == false` with an owner: records created by that
//!   owner, read through the owner index.
//! - `include_visible == false` without an owner: every record.
//! - `include_visible == true`: every record that is public or created by
//!   the owner (public only when there is no owner).
//!
//! Search is a boolean AND of case-insensitive substring terms. There is
//! no ranking and no OR.

use crate::error::{CoreResult, ValidationError};
use crate::model::Record;
use crate::store::RecordStore;
use serde::Serialize;
use std::cmp::Reverse;

/// Parameters for [`RecordStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Identity whose records to list, or whose private records to include.
    pub owner: Option<String>,
    /// Whether to include every public record.
    pub include_visible: bool,
    /// 1-based page number.
    pub page: usize,
    /// Page size; the store default when `None`.
    pub per_page: Option<usize>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            owner: None,
            include_visible: false,
            page: 1,
            per_page: None,
        }
    }
}

impl ListQuery {
    /// Lists the records created by `owner`.
    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::default()
        }
    }

    /// Lists public records plus those of `owner`.
    pub fn visible_to(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            include_visible: true,
            ..Self::default()
        }
    }

    /// Lists public records only.
    #[must_use]
    pub fn public() -> Self {
        Self {
            include_visible: true,
            ..Self::default()
        }
    }

    /// Sets the page number.
    #[must_use]
    pub const fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = Some(per_page);
        self
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Number of matching items across all pages.
    pub total: usize,
    /// The 1-based page number.
    pub page: usize,
    /// The effective page size.
    pub per_page: usize,
    /// `ceil(total / per_page)`.
    pub page_count: usize,
}

impl<T> Page<T> {
    /// Cuts page `page` out of the full, already sorted result set.
    ///
    /// A page past the end is empty but still reports `total`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPage` when `page` or `per_page` is zero.
    pub fn slice(all: Vec<T>, page: usize, per_page: usize) -> Result<Self, ValidationError> {
        if page == 0 || per_page == 0 {
            return Err(ValidationError::InvalidPage { page, per_page });
        }
        let total = all.len();
        let start = (page - 1).saturating_mul(per_page);
        let items = all.into_iter().skip(start).take(per_page).collect();
        Ok(Self {
            items,
            total,
            page,
            per_page,
            page_count: total.div_ceil(per_page),
        })
    }
}

/// Parameters for [`RecordStore::search`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Query text; see [`tokenize`].
    pub text: String,
    /// Identity scoping the search.
    pub owner: Option<String>,
    /// Whether to include every public record.
    pub include_visible: bool,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl SearchQuery {
    /// Creates a query over every record.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Restricts the search to records created by `owner`.
    #[must_use]
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self.include_visible = false;
        self
    }

    /// Restricts the search to public records and those of `owner`.
    #[must_use]
    pub fn visible_to(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self.include_visible = true;
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Splits query text into search terms.
///
/// Terms are separated by whitespace. A `'` or `"` at the start of a term
/// opens a quoted span that runs to the matching quote (or to the end of
/// the input) and may contain whitespace; the quotes are dropped. Quotes
/// inside a word are literal. Blank terms are discarded.
///
/// ```rust
/// use workid_core::tokenize;
///
/// assert_eq!(tokenize(r#"alpha "quarterly report" it's"#), vec!["alpha", "quarterly report", "it's"]);
/// ```
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut chars = text.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };
        let mut term = String::new();
        if first == '"' || first == '\'' {
            chars.next();
            for c in chars.by_ref() {
                if c == first {
                    break;
                }
                term.push(c);
            }
        }
        while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
            term.push(c);
        }
        if !term.trim().is_empty() {
            terms.push(term);
        }
    }
    terms
}

/// Case-folded terms a record must all contain. Empty means match all.
fn search_terms(text: &str) -> Vec<String> {
    let terms = tokenize(text);
    if terms.len() == 1 && terms[0] == "*" {
        return Vec::new();
    }
    terms.into_iter().map(|t| t.to_lowercase()).collect()
}

impl RecordStore {
    /// Lists records, newest change first.
    ///
    /// Ties on `changed_at` are broken by id.
    ///
    /// # Errors
    ///
    /// Returns `Validation(InvalidPage)` for a zero page or page size, and
    /// `Storage` / `Corrupted` from the scan.
    pub fn list(&self, query: &ListQuery) -> CoreResult<Page<Record>> {
        let per_page = self.effective_per_page(query.page, query.per_page)?;
        let mut records = self.candidates(query.owner.as_deref(), query.include_visible)?;
        records.sort_by(|a, b| {
            Reverse(a.changed_at)
                .cmp(&Reverse(b.changed_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        tracing::debug!(
            owner = query.owner.as_deref(),
            include_visible = query.include_visible,
            total = records.len(),
            "listed records"
        );
        Ok(Page::slice(records, query.page, per_page)?)
    }

    /// Returns every candidate record containing all query terms, newest
    /// first by `created_at` (ties broken by id).
    ///
    /// An empty query, or one consisting of `*`, matches every candidate.
    ///
    /// # Errors
    ///
    /// Returns `Storage` / `Corrupted` from the scan.
    pub fn search(&self, query: &SearchQuery) -> CoreResult<Vec<Record>> {
        let mut matches = self.search_all(query)?;
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    fn search_all(&self, query: &SearchQuery) -> CoreResult<Vec<Record>> {
        let terms = search_terms(&query.text);
        let mut matches: Vec<Record> = self
            .candidates(query.owner.as_deref(), query.include_visible)?
            .into_iter()
            .filter(|record| {
                if terms.is_empty() {
                    return true;
                }
                let corpus = record.search_corpus();
                terms.iter().all(|term| corpus.contains(term.as_str()))
            })
            .collect();
        matches.sort_by(|a, b| {
            Reverse(a.created_at)
                .cmp(&Reverse(b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        tracing::debug!(terms = terms.len(), hits = matches.len(), "search finished");
        Ok(matches)
    }

    /// Runs [`search`](Self::search) and paginates the result like
    /// [`list`](Self::list).
    ///
    /// `query.limit` is ignored here, so `total` counts every match.
    ///
    /// # Errors
    ///
    /// Same as [`list`](Self::list).
    pub fn search_page(
        &self,
        query: &SearchQuery,
        page: usize,
        per_page: Option<usize>,
    ) -> CoreResult<Page<Record>> {
        let per_page = self.effective_per_page(page, per_page)?;
        let matches = self.search_all(query)?;
        Ok(Page::slice(matches, page, per_page)?)
    }

    fn effective_per_page(&self, page: usize, per_page: Option<usize>) -> CoreResult<usize> {
        let per_page = per_page.unwrap_or(self.config().default_per_page);
        if page == 0 || per_page == 0 {
            return Err(ValidationError::InvalidPage { page, per_page }.into());
        }
        Ok(per_page.min(self.config().max_per_page))
    }

    fn candidates(&self, owner: Option<&str>, include_visible: bool) -> CoreResult<Vec<Record>> {
        match (owner, include_visible) {
            (Some(owner), false) => self.owned_records(owner),
            (None, false) => self.scan_records(),
            (owner, true) => Ok(self
                .scan_records()?
                .into_iter()
                .filter(|record| record.is_visible_to(owner))
                .collect()),
        }
    }

    fn owned_records(&self, owner: &str) -> CoreResult<Vec<Record>> {
        let ids = self.backend().set_members(&self.owner_key(owner))?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&id)? {
                Some(record) if record.creator_id == owner => records.push(record),
                Some(record) => {
                    tracing::warn!(
                        id = %id,
                        owner,
                        creator = %record.creator_id,
                        "owner index lists a foreign record, skipping"
                    );
                }
                None => {
                    tracing::warn!(id = %id, owner, "owner index entry is dangling, skipping");
                }
            }
        }
        Ok(records)
    }

    /// Reads every record. Keys that vanish between enumeration and fetch
    /// are skipped.
    pub(crate) fn scan_records(&self) -> CoreResult<Vec<Record>> {
        let keys = self.backend().scan_prefix(&self.record_scan_prefix())?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.load_key(&key)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}
