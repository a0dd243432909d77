//! Remote paginator: cursor-driven access to the flomo memo feed.
//!
//! The paginator is restartable. Asking twice for the page after the same
//! cursor yields the same page (given no remote mutation in between), which
//! is what lets the sync orchestrator retry a failed fetch blindly.

mod client;
mod html;
#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Note, SyncCursor};

pub use client::{
    normalize_token, parse_remote_timestamp, FlomoClient, RemoteConfig, DEFAULT_API_BASE_URL,
    DEFAULT_PAGE_SIZE,
};
pub use html::html_to_text;

/// One batch of notes plus the cursor to continue from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemotePage {
    pub notes: Vec<Note>,
    /// `None` ends the sequence
    pub next_cursor: Option<SyncCursor>,
}

impl RemotePage {
    pub const fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Source of successive note pages.
///
/// Failures must surface as `RemoteUnavailable` or `Unauthorized`. An empty
/// page always means the remote has nothing more, never "could not reach it".
#[async_trait]
pub trait RemotePaginator: Send + Sync {
    /// Fetch the page following `cursor` (`None` for the first page)
    async fn next_page(&self, cursor: Option<&SyncCursor>) -> Result<RemotePage>;
}
