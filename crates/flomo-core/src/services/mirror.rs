//! Shared database, sync and query service used by clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::db::{Database, NoteRepository, SqliteNoteRepository};
use crate::error::{Error, Result};
use crate::export::{render_export, ExportFormat, ExportOptions};
use crate::models::{
    Note, NoteId, PageRequest, QueryPage, SortOrder, SyncMode, SyncPhase, SyncReport, SyncRun,
    SyncStatus,
};
use crate::query::{list_page, search_page};
use crate::remote::RemotePaginator;
use crate::sync::{RetryPolicy, SyncOrchestrator};

/// Which notes an export covers: the whole store in `order`, optionally cut
/// to the first `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSelection {
    pub order: SortOrder,
    pub limit: Option<usize>,
}

/// Thread-safe service over the local store and, when a remote is attached,
/// the sync orchestrator.
#[derive(Clone)]
pub struct MirrorService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    sync: Option<Arc<SyncOrchestrator>>,
}

impl MirrorService {
    /// Open the store at the given filesystem path, creating parent folders.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::debug!("Opened note store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
            sync: None,
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
            sync: None,
        })
    }

    /// Attach a remote so the sync commands become available.
    pub async fn with_remote(
        mut self,
        remote: Arc<dyn RemotePaginator>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let orchestrator = SyncOrchestrator::new(Arc::clone(&self.db), remote, policy).await?;
        self.sync = Some(Arc::new(orchestrator));
        Ok(self)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn orchestrator(&self) -> Result<&Arc<SyncOrchestrator>> {
        self.sync.as_ref().ok_or_else(|| {
            Error::Config("no authorization token configured; sync is unavailable".into())
        })
    }

    /// Start a sync pass in the background.
    pub fn start_sync(&self, mode: SyncMode) -> Result<JoinHandle<Result<SyncReport>>> {
        self.orchestrator()?.start(mode)
    }

    /// Run a sync pass and wait for it.
    pub async fn run_sync(&self, mode: SyncMode) -> Result<SyncReport> {
        self.orchestrator()?.run_pass(mode).await
    }

    /// Request cancellation of the running pass; `false` if none is running.
    pub fn cancel_sync(&self) -> bool {
        self.sync
            .as_ref()
            .is_some_and(|orchestrator| orchestrator.cancel())
    }

    pub async fn get_sync_status(&self) -> Result<SyncStatus> {
        if let Some(orchestrator) = &self.sync {
            return orchestrator.status().await;
        }

        // Without a remote there is no live pass; answer from the store alone
        let db = self.db.lock().await;
        let repo = SqliteNoteRepository::new(db.connection());
        let last_run = repo.last_completed_run()?;
        Ok(SyncStatus {
            total_notes: repo.count()?,
            last_synced_at: last_run
                .and_then(|run| chrono::DateTime::from_timestamp_millis(run.finished_at)),
            in_progress: false,
            phase: SyncPhase::Idle,
            last_error: None,
            cursor: repo.latest_cursor()?,
        })
    }

    /// One page of notes; arguments are validated before the store is read.
    pub async fn list_notes(
        &self,
        order_by: &str,
        order_dir: &str,
        offset: i64,
        limit: i64,
    ) -> Result<QueryPage> {
        let request = PageRequest::parse(order_by, order_dir, offset, limit)?;
        let db = self.db.lock().await;
        list_page(&SqliteNoteRepository::new(db.connection()), request)
    }

    /// One page of notes matching `query` in content or tags.
    pub async fn search_notes(
        &self,
        query: &str,
        order_by: &str,
        order_dir: &str,
        offset: i64,
        limit: i64,
    ) -> Result<QueryPage> {
        let request = PageRequest::parse(order_by, order_dir, offset, limit)?;
        let db = self.db.lock().await;
        search_page(&SqliteNoteRepository::new(db.connection()), query, request)
    }

    pub async fn get_note(&self, id: &NoteId) -> Result<Option<Note>> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).get(id)
    }

    /// Every note in `order`, untruncated.
    pub async fn fetch_all_ordered(&self, order: SortOrder) -> Result<Vec<Note>> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).fetch_all_ordered(order)
    }

    pub async fn list_sync_runs(&self, limit: usize) -> Result<Vec<SyncRun>> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).list_sync_runs(limit)
    }

    /// Render a caller-held note set.
    pub fn export_notes(
        notes: &[Note],
        format: ExportFormat,
        options: &ExportOptions,
    ) -> Result<String> {
        render_export(notes, format, options)
    }

    /// Select from the store, then render.
    pub async fn export_selection(
        &self,
        selection: ExportSelection,
        format: ExportFormat,
        options: &ExportOptions,
    ) -> Result<String> {
        let mut notes = self.fetch_all_ordered(selection.order).await?;
        if let Some(limit) = selection.limit {
            notes.truncate(limit);
        }
        tracing::debug!("Exporting {} notes as {}", notes.len(), format);
        Self::export_notes(&notes, format, options)
    }
}
