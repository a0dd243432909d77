//! flomo-core - Core library for flomo-mirror
//!
//! This crate mirrors flomo memos into a local `SQLite` store and answers
//! list, search and export calls from that store without touching the
//! network. It contains the models, the store, the remote paginator, the
//! sync orchestrator, the query engine and the export renderers used by the
//! CLI.

pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod query;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Note, NoteId, QueryPage, SortOrder, SyncCursor, SyncMode, SyncStatus};
