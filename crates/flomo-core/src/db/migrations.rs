//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(version.unwrap_or(0))
}

/// Migration to version 1: notes, tag search index, O(1) note counter
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            content_folded TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            url TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_notes_created ON notes(created_at, id);
        CREATE INDEX IF NOT EXISTS idx_notes_updated ON notes(updated_at, id);

        CREATE TABLE IF NOT EXISTS note_tags (
            note_id TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            name_folded TEXT NOT NULL,
            PRIMARY KEY (note_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_note_tags_folded ON note_tags(name_folded);

        CREATE TABLE IF NOT EXISTS note_stats (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            note_count INTEGER NOT NULL
        );
        INSERT OR IGNORE INTO note_stats (id, note_count) VALUES (1, 0);

        CREATE TRIGGER IF NOT EXISTS notes_count_ai AFTER INSERT ON notes BEGIN
            UPDATE note_stats SET note_count = note_count + 1 WHERE id = 1;
        END;
        CREATE TRIGGER IF NOT EXISTS notes_count_ad AFTER DELETE ON notes BEGIN
            UPDATE note_stats SET note_count = note_count - 1 WHERE id = 1;
        END;

        INSERT INTO schema_version (version) VALUES (1);",
    )?;

    tx.commit()?;
    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: sync run log
fn migrate_v2(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS sync_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at INTEGER NOT NULL,
            finished_at INTEGER NOT NULL,
            mode TEXT NOT NULL,
            outcome TEXT NOT NULL,
            notes_applied INTEGER NOT NULL,
            error TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_sync_runs_finished ON sync_runs(finished_at DESC);

        INSERT INTO schema_version (version) VALUES (2);",
    )?;

    tx.commit()?;
    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrations() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let mut conn = setup();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        for table in ["notes", "note_tags", "note_stats", "sync_runs"] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }

    #[test]
    fn test_note_counter_tracks_inserts_and_deletes() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO notes (id, content, content_folded, created_at, updated_at)
             VALUES ('a', 'x', 'x', 1, 1)",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM notes WHERE id = 'a'", []).unwrap();
        conn.execute(
            "INSERT INTO notes (id, content, content_folded, created_at, updated_at)
             VALUES ('b', 'y', 'y', 1, 1)",
            [],
        )
        .unwrap();

        let count: i64 = conn
            .query_row("SELECT note_count FROM note_stats WHERE id = 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
