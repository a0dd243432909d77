//! In-memory paginator for exercising sync passes without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{RemotePage, RemotePaginator};
use crate::error::{Error, Result};
use crate::models::{Note, SyncCursor};

/// Pauses a fetch until the test releases it
#[derive(Default)]
pub(crate) struct Gate {
    pub reached: Notify,
    pub release: Notify,
}

/// Serves `notes` in `(updated_at, id)` order, `page_size` at a time, the
/// way the real feed does: a short page is the last one.
pub(crate) struct ScriptedPaginator {
    notes: Mutex<Vec<Note>>,
    page_size: usize,
    failures: Mutex<HashMap<usize, u32>>,
    unauthorized: bool,
    gate: Option<(usize, Arc<Gate>)>,
    calls: AtomicUsize,
}

impl ScriptedPaginator {
    pub fn new(notes: Vec<Note>, page_size: usize) -> Self {
        let paginator = Self {
            notes: Mutex::new(Vec::new()),
            page_size,
            failures: Mutex::new(HashMap::new()),
            unauthorized: false,
            gate: None,
            calls: AtomicUsize::new(0),
        };
        paginator.replace_notes(notes);
        paginator
    }

    /// Fail the fetch of page `index` the next `times` times
    pub fn fail_page(self, index: usize, times: u32) -> Self {
        self.set_failures(index, times);
        self
    }

    /// Report injected failures as rejected credentials
    pub const fn unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    /// Block the fetch of page `index` on `gate`
    pub fn gated(mut self, index: usize, gate: Arc<Gate>) -> Self {
        self.gate = Some((index, gate));
        self
    }

    pub fn set_failures(&self, index: usize, times: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(index, times);
    }

    /// Change the remote contents between passes
    pub fn replace_notes(&self, mut notes: Vec<Note>) {
        notes.sort_by(|a, b| (a.updated_at, &a.id).cmp(&(b.updated_at, &b.id)));
        *self.notes.lock().unwrap() = notes;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn start_index(notes: &[Note], cursor: Option<&SyncCursor>) -> usize {
        cursor.map_or(0, |cursor| {
            notes
                .iter()
                .take_while(|note| (note.updated_at, &note.id) <= (cursor.updated_at, &cursor.id))
                .count()
        })
    }
}

#[async_trait]
impl RemotePaginator for ScriptedPaginator {
    async fn next_page(&self, cursor: Option<&SyncCursor>) -> Result<RemotePage> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (start, page) = {
            let notes = self.notes.lock().unwrap();
            let start = Self::start_index(&notes, cursor);
            let page = notes
                .iter()
                .skip(start)
                .take(self.page_size)
                .cloned()
                .collect::<Vec<_>>();
            (start, page)
        };
        let index = start / self.page_size;

        if let Some((gate_index, gate)) = &self.gate {
            if *gate_index == index {
                gate.reached.notify_one();
                gate.release.notified().await;
            }
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&index) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(if self.unauthorized {
                        Error::Unauthorized("token expired".into())
                    } else {
                        Error::RemoteUnavailable(format!("page {index} timed out"))
                    });
                }
            }
        }

        let next_cursor = if page.len() == self.page_size {
            page.last().map(SyncCursor::after)
        } else {
            None
        };
        Ok(RemotePage {
            notes: page,
            next_cursor,
        })
    }
}
