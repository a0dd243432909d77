//! Remote continuation cursor

use serde::{Deserialize, Serialize};

use super::{Note, NoteId};

/// Position in the remote's paginated sequence: the last note observed.
///
/// Only the remote paginator interprets it. It is deliberately unrelated to
/// [`PageOffset`](super::PageOffset), which addresses the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Identifier of the last observed note
    pub id: NoteId,
    /// `updated_at` of the last observed note (Unix ms)
    pub updated_at: i64,
}

impl SyncCursor {
    pub fn new(id: impl Into<NoteId>, updated_at: i64) -> Self {
        Self {
            id: id.into(),
            updated_at,
        }
    }

    /// Cursor pointing just past `note`.
    pub fn after(note: &Note) -> Self {
        Self::new(note.id.clone(), note.updated_at)
    }

    /// `updated_at` in whole seconds, the resolution the remote accepts.
    pub const fn updated_at_secs(&self) -> i64 {
        self.updated_at.div_euclid(1000)
    }
}
