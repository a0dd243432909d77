//! Data models for flomo-mirror

mod cursor;
mod note;
mod query;
mod sync_run;

pub use cursor::SyncCursor;
pub use note::{fold_case, normalize_tags, Note, NoteId};
pub use query::{
    PageOffset, PageRequest, QueryPage, SortDirection, SortField, SortOrder, MAX_PAGE_LIMIT,
};
pub use sync_run::{SyncMode, SyncOutcome, SyncPhase, SyncReport, SyncRun, SyncStatus};
