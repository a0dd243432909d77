//! Paginated listing and search over the local store.
//!
//! Queries read only the store, never the remote. Each page is fetched one
//! row beyond its limit so `has_more` is exact without a separate count.

use crate::db::NoteRepository;
use crate::error::Result;
use crate::models::{Note, PageRequest, QueryPage, SortOrder};

/// One page of the whole store in the requested order.
pub fn list_page<R>(repo: &R, request: PageRequest) -> Result<QueryPage>
where
    R: NoteRepository + ?Sized,
{
    let rows = repo.list(request.order, request.offset, request.limit + 1)?;
    Ok(into_page(rows, request))
}

/// One page of the notes whose content or tags contain `query`, ignoring case.
///
/// A blank query matches nothing and does not touch the store.
pub fn search_page<R>(repo: &R, query: &str, request: PageRequest) -> Result<QueryPage>
where
    R: NoteRepository + ?Sized,
{
    if query.trim().is_empty() {
        return Ok(QueryPage::empty());
    }

    let rows = repo.search(query, request.order, request.offset, request.limit + 1)?;
    Ok(into_page(rows, request))
}

/// Sort an in-memory note set the same way the store orders rows.
pub fn sort_notes(notes: &mut [Note], order: SortOrder) {
    notes.sort_by(|a, b| order.compare(a, b));
}

fn into_page(mut rows: Vec<Note>, request: PageRequest) -> QueryPage {
    let has_more = rows.len() > request.limit;
    rows.truncate(request.limit);

    QueryPage {
        items: rows,
        has_more,
        next_offset: has_more.then(|| request.offset.advance(request.limit)),
    }
}
