//! Local note store backed by `SQLite`

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{NoteRepository, SqliteNoteRepository};
