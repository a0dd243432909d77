//! Note repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET and counters
#![allow(clippy::cast_sign_loss)]

use crate::error::Result;
use crate::models::{
    fold_case, Note, NoteId, PageOffset, SortOrder, SyncCursor, SyncMode, SyncOutcome, SyncRun,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

const NOTE_COLUMNS: &str = "id, content, created_at, updated_at, tags, url";

/// Trait for note storage operations
pub trait NoteRepository {
    /// Insert the note, or replace every field of the note with the same id
    fn upsert(&self, note: &Note) -> Result<()>;

    /// Upsert every note in one transaction: all or nothing
    fn upsert_batch(&self, notes: &[Note]) -> Result<()>;

    /// Get a note by ID
    fn get(&self, id: &NoteId) -> Result<Option<Note>>;

    /// Number of stored notes, read from the maintained counter
    fn count(&self) -> Result<u64>;

    /// One window of the store in the given order
    fn list(&self, order: SortOrder, offset: PageOffset, limit: usize) -> Result<Vec<Note>>;

    /// Case-insensitive substring search over content and tags
    fn search(
        &self,
        query: &str,
        order: SortOrder,
        offset: PageOffset,
        limit: usize,
    ) -> Result<Vec<Note>>;

    /// Every note in the given order, untruncated
    fn fetch_all_ordered(&self, order: SortOrder) -> Result<Vec<Note>>;

    /// Cursor for the note with the greatest `(updated_at, id)`
    fn latest_cursor(&self) -> Result<Option<SyncCursor>>;

    /// Append a finished pass to the sync run log
    fn record_sync_run(&self, run: &SyncRun) -> Result<i64>;

    /// Most recent pass that ran to completion
    fn last_completed_run(&self) -> Result<Option<SyncRun>>;

    /// Most recent passes, newest first
    fn list_sync_runs(&self, limit: usize) -> Result<Vec<SyncRun>>;
}

/// `SQLite` implementation of `NoteRepository`
pub struct SqliteNoteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteNoteRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Write one note inside the caller's transaction.
    ///
    /// Updates in place first so an existing row keeps its rowid, and only
    /// inserts when nothing matched. The tag index is rebuilt either way.
    fn write_note(conn: &Connection, note: &Note) -> Result<()> {
        let tags = serde_json::to_string(&note.tags)?;
        let content_folded = fold_case(&note.content);

        let updated = conn.execute(
            "UPDATE notes
             SET content = ?2, content_folded = ?3, created_at = ?4, updated_at = ?5, tags = ?6, url = ?7
             WHERE id = ?1",
            params![
                note.id.as_str(),
                note.content,
                content_folded,
                note.created_at,
                note.updated_at,
                tags,
                note.url
            ],
        )?;

        if updated == 0 {
            conn.execute(
                "INSERT INTO notes (id, content, content_folded, created_at, updated_at, tags, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    note.id.as_str(),
                    note.content,
                    content_folded,
                    note.created_at,
                    note.updated_at,
                    tags,
                    note.url
                ],
            )?;
        }

        conn.execute(
            "DELETE FROM note_tags WHERE note_id = ?",
            params![note.id.as_str()],
        )?;
        let mut insert_tag = conn.prepare_cached(
            "INSERT INTO note_tags (note_id, position, name, name_folded) VALUES (?, ?, ?, ?)",
        )?;
        for (position, tag) in note.tags.iter().enumerate() {
            insert_tag.execute(params![
                note.id.as_str(),
                position as i64,
                tag,
                fold_case(tag)
            ])?;
        }

        Ok(())
    }

    /// Parse a note from a database row selected with `NOTE_COLUMNS`
    fn parse_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
        let id: String = row.get(0)?;
        let tags: String = row.get(4)?;
        let tags = serde_json::from_str::<Vec<String>>(&tags)
            .map_err(|error| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(error)))?;

        Ok(Note {
            id: NoteId::new(id),
            content: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
            tags,
            url: row.get(5)?,
        })
    }

    fn parse_sync_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRun> {
        let mode: String = row.get(3)?;
        let outcome: String = row.get(4)?;
        let notes_applied: i64 = row.get(5)?;

        Ok(SyncRun {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            mode: mode.parse::<SyncMode>().map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(error))
            })?,
            outcome: outcome.parse::<SyncOutcome>().map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(error))
            })?,
            notes_applied: notes_applied.max(0) as u64,
            error: row.get(6)?,
        })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn upsert(&self, note: &Note) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        Self::write_note(&tx, note)?;
        tx.commit()?;
        Ok(())
    }

    fn upsert_batch(&self, notes: &[Note]) -> Result<()> {
        if notes.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on error rolls the whole batch back
        let tx = self.conn.unchecked_transaction()?;
        for note in notes {
            Self::write_note(&tx, note)?;
        }
        tx.commit()?;

        tracing::debug!("Applied batch of {} notes", notes.len());
        Ok(())
    }

    fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"),
                params![id.as_str()],
                Self::parse_note,
            )
            .optional()?;

        Ok(note)
    }

    fn count(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT note_count FROM note_stats WHERE id = 1",
            [],
            |row| row.get(0),
        )?;

        Ok(count.max(0) as u64)
    }

    fn list(&self, order: SortOrder, offset: PageOffset, limit: usize) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS}
             FROM notes
             ORDER BY {}
             LIMIT ? OFFSET ?",
            order.sql()
        ))?;

        let notes = stmt
            .query_map(
                params![limit as i64, offset.get() as i64],
                Self::parse_note,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(notes)
    }

    fn search(
        &self,
        query: &str,
        order: SortOrder,
        offset: PageOffset,
        limit: usize,
    ) -> Result<Vec<Note>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS}
             FROM notes
             WHERE instr(content_folded, ?1) > 0
                OR EXISTS (
                    SELECT 1 FROM note_tags t
                    WHERE t.note_id = notes.id AND instr(t.name_folded, ?1) > 0
                )
             ORDER BY {}
             LIMIT ?2 OFFSET ?3",
            order.sql()
        ))?;

        let notes = stmt
            .query_map(
                params![fold_case(query), limit as i64, offset.get() as i64],
                Self::parse_note,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(notes)
    }

    fn fetch_all_ordered(&self, order: SortOrder) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY {}",
            order.sql()
        ))?;

        let notes = stmt
            .query_map([], Self::parse_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(notes)
    }

    fn latest_cursor(&self) -> Result<Option<SyncCursor>> {
        let cursor = self
            .conn
            .query_row(
                "SELECT id, updated_at FROM notes ORDER BY updated_at DESC, id DESC LIMIT 1",
                [],
                |row| {
                    let id: String = row.get(0)?;
                    Ok(SyncCursor::new(id, row.get(1)?))
                },
            )
            .optional()?;

        Ok(cursor)
    }

    fn record_sync_run(&self, run: &SyncRun) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sync_runs (started_at, finished_at, mode, outcome, notes_applied, error)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                run.started_at,
                run.finished_at,
                run.mode.as_str(),
                run.outcome.as_str(),
                run.notes_applied as i64,
                run.error
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn last_completed_run(&self) -> Result<Option<SyncRun>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, mode, outcome, notes_applied, error
                 FROM sync_runs
                 WHERE outcome = 'completed'
                 ORDER BY finished_at DESC, id DESC
                 LIMIT 1",
                [],
                Self::parse_sync_run,
            )
            .optional()?;

        Ok(run)
    }

    fn list_sync_runs(&self, limit: usize) -> Result<Vec<SyncRun>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, mode, outcome, notes_applied, error
             FROM sync_runs
             ORDER BY finished_at DESC, id DESC
             LIMIT ?",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], Self::parse_sync_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(runs)
    }
}
