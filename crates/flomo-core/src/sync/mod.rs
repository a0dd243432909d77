//! Sync orchestrator: drives the remote paginator into the local store.
//!
//! A pass walks the remote sequence page by page. Each page is written in
//! one transaction before the next is fetched, so a pass that stops for any
//! reason leaves the store holding whole pages only. Because the write is an
//! idempotent upsert, retrying a page or rerunning a pass never duplicates
//! notes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::db::{Database, NoteRepository, SqliteNoteRepository};
use crate::error::{Error, Result};
use crate::models::{
    SyncCursor, SyncMode, SyncOutcome, SyncPhase, SyncReport, SyncRun, SyncStatus,
};
use crate::remote::{RemotePage, RemotePaginator};

/// How often and how patiently a failed page fetch is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total fetch attempts per page, first try included
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Retry without sleeping between attempts
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, doubling from the initial backoff.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Default)]
struct SyncState {
    phase: SyncPhase,
    last_error: Option<String>,
    cursor: Option<SyncCursor>,
    last_synced_at: Option<DateTime<Utc>>,
}

/// Owns the sync state machine: Idle, Running, Failed.
///
/// At most one pass runs at a time. Starting a second one fails fast with
/// [`Error::AlreadySyncing`] instead of queueing.
pub struct SyncOrchestrator {
    db: Arc<tokio::sync::Mutex<Database>>,
    remote: Arc<dyn RemotePaginator>,
    policy: RetryPolicy,
    state: Arc<Mutex<SyncState>>,
    cancel_requested: AtomicBool,
}

impl SyncOrchestrator {
    /// Build an orchestrator, restoring `last_synced_at` from the run log.
    pub async fn new(
        db: Arc<tokio::sync::Mutex<Database>>,
        remote: Arc<dyn RemotePaginator>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let (last_run, cursor) = {
            let db = db.lock().await;
            let repo = SqliteNoteRepository::new(db.connection());
            (repo.last_completed_run()?, repo.latest_cursor()?)
        };

        let state = SyncState {
            cursor,
            last_synced_at: last_run.and_then(|run| DateTime::from_timestamp_millis(run.finished_at)),
            ..SyncState::default()
        };

        Ok(Self {
            db,
            remote,
            policy,
            state: Arc::new(Mutex::new(state)),
            cancel_requested: AtomicBool::new(false),
        })
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        lock_state(&self.state)
    }

    /// Run one pass to completion on the current task.
    ///
    /// Dropping the returned future mid-pass leaves the orchestrator
    /// `Failed`, never stuck in `Running`.
    pub async fn run_pass(&self, mode: SyncMode) -> Result<SyncReport> {
        let guard = self.begin()?;
        self.execute(mode, guard).await
    }

    /// Start a pass on a background task.
    ///
    /// The Idle to Running transition happens before this returns, so a
    /// concurrent caller sees `AlreadySyncing` immediately.
    pub fn start(self: &Arc<Self>, mode: SyncMode) -> Result<JoinHandle<Result<SyncReport>>> {
        let guard = self.begin()?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.execute(mode, guard).await }))
    }

    /// Ask the running pass to stop at the next page boundary.
    ///
    /// Returns `false` when no pass is running.
    pub fn cancel(&self) -> bool {
        let state = self.state();
        if state.phase != SyncPhase::Running {
            return false;
        }
        self.cancel_requested.store(true, Ordering::SeqCst);
        tracing::info!("Sync cancellation requested");
        true
    }

    pub fn is_running(&self) -> bool {
        self.state().phase == SyncPhase::Running
    }

    /// Status snapshot; never blocks on the remote.
    pub async fn status(&self) -> Result<SyncStatus> {
        let total_notes = {
            let db = self.db.lock().await;
            SqliteNoteRepository::new(db.connection()).count()?
        };

        let state = self.state();
        Ok(SyncStatus {
            total_notes,
            last_synced_at: state.last_synced_at,
            in_progress: state.phase == SyncPhase::Running,
            phase: state.phase,
            last_error: state.last_error.clone(),
            cursor: state.cursor.clone(),
        })
    }

    fn begin(&self) -> Result<PassGuard> {
        let mut state = self.state();
        if state.phase == SyncPhase::Running {
            return Err(Error::AlreadySyncing);
        }
        state.phase = SyncPhase::Running;
        state.last_error = None;
        self.cancel_requested.store(false, Ordering::SeqCst);
        Ok(PassGuard {
            state: Arc::clone(&self.state),
            finished: false,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    async fn execute(&self, mode: SyncMode, guard: PassGuard) -> Result<SyncReport> {
        let started_at = Utc::now();
        tracing::info!("Starting {mode} sync pass");

        let mut progress = PassProgress::default();
        let result = self.walk(mode, &mut progress).await;
        let finished_at = Utc::now();

        let (outcome, error_message) = match &result {
            Ok(()) if progress.cancelled => (SyncOutcome::Cancelled, None),
            Ok(()) => (SyncOutcome::Completed, None),
            Err(error) => (SyncOutcome::Failed, Some(error.to_string())),
        };
        self.record_run(SyncRun {
            id: 0,
            started_at: started_at.timestamp_millis(),
            finished_at: finished_at.timestamp_millis(),
            mode,
            outcome,
            notes_applied: progress.notes_applied,
            error: error_message.clone(),
        })
        .await;

        guard.finish(|state| match outcome {
            SyncOutcome::Completed => {
                state.phase = SyncPhase::Idle;
                state.last_synced_at = Some(finished_at);
            }
            SyncOutcome::Cancelled => state.phase = SyncPhase::Idle,
            SyncOutcome::Failed => {
                state.phase = SyncPhase::Failed;
                state.last_error = error_message;
            }
        });
        self.cancel_requested.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                tracing::info!(
                    "Sync pass {}: {} pages, {} notes applied",
                    outcome.as_str(),
                    progress.pages_applied,
                    progress.notes_applied
                );
                Ok(SyncReport {
                    mode,
                    pages_applied: progress.pages_applied,
                    notes_applied: progress.notes_applied,
                    cancelled: progress.cancelled,
                    cursor: progress.cursor,
                    started_at,
                    finished_at,
                })
            }
            Err(error) => {
                tracing::error!(
                    "Sync pass failed after {} pages: {}",
                    progress.pages_applied,
                    error
                );
                Err(error)
            }
        }
    }

    async fn walk(&self, mode: SyncMode, progress: &mut PassProgress) -> Result<()> {
        let mut cursor = match mode {
            SyncMode::Full => None,
            SyncMode::Incremental => {
                let db = self.db.lock().await;
                SqliteNoteRepository::new(db.connection()).latest_cursor()?
            }
        };

        loop {
            if self.is_cancelled() {
                progress.cancelled = true;
                return Ok(());
            }

            let page = self.fetch_with_retry(cursor.as_ref()).await?;

            // A fetched page is discarded rather than applied after cancel
            if self.is_cancelled() {
                progress.cancelled = true;
                return Ok(());
            }

            self.apply_page(&page).await?;
            progress.pages_applied += 1;
            progress.notes_applied += page.notes.len() as u64;
            if let Some(last) = page.notes.last() {
                progress.cursor = Some(SyncCursor::after(last));
                self.state().cursor = progress.cursor.clone();
            }

            match page.next_cursor {
                Some(next) if !page.notes.is_empty() && cursor.as_ref() != Some(&next) => {
                    cursor = Some(next);
                }
                Some(next) => {
                    return Err(Error::RemoteUnavailable(format!(
                        "remote returned a non-advancing cursor at {}",
                        next.id
                    )));
                }
                None => return Ok(()),
            }
        }
    }

    async fn fetch_with_retry(&self, cursor: Option<&SyncCursor>) -> Result<RemotePage> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.remote.next_page(cursor).await {
                Ok(page) => return Ok(page),
                Err(error) if error.is_remote() && attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        "Page fetch failed (attempt {attempt}/{max_attempts}): {error}; retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn apply_page(&self, page: &RemotePage) -> Result<()> {
        let db = self.db.lock().await;
        SqliteNoteRepository::new(db.connection()).upsert_batch(&page.notes)
    }

    async fn record_run(&self, run: SyncRun) {
        let db = self.db.lock().await;
        if let Err(error) = SqliteNoteRepository::new(db.connection()).record_sync_run(&run) {
            tracing::warn!("Failed to record sync run: {}", error);
        }
    }
}

fn lock_state(state: &Mutex<SyncState>) -> MutexGuard<'_, SyncState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the Running phase for one pass.
///
/// A pass that is dropped or panics before `finish` ends up `Failed`.
struct PassGuard {
    state: Arc<Mutex<SyncState>>,
    finished: bool,
}

impl PassGuard {
    fn finish(mut self, update: impl FnOnce(&mut SyncState)) {
        update(&mut *lock_state(&self.state));
        self.finished = true;
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = lock_state(&self.state);
        state.phase = SyncPhase::Failed;
        state.last_error = Some("sync pass aborted before finishing".to_string());
        tracing::warn!("Sync pass aborted before finishing");
    }
}

#[derive(Debug, Default)]
struct PassProgress {
    pages_applied: u64,
    notes_applied: u64,
    cancelled: bool,
    cursor: Option<SyncCursor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Note, NoteId, PageOffset, SortDirection, SortField, SortOrder};
    use crate::remote::scripted::{Gate, ScriptedPaginator};
    use pretty_assertions::assert_eq;

    const ORDER: SortOrder = SortOrder::new(SortField::UpdatedAt, SortDirection::Asc);

    fn remote_notes(count: usize) -> Vec<Note> {
        (0..count)
            .map(|i| {
                let ts = 1_700_000_000_000 + i as i64 * 1_000;
                Note::new(format!("memo-{i:04}"), format!("note {i}"), ts, ts)
            })
            .collect()
    }

    fn shared_db() -> Arc<tokio::sync::Mutex<Database>> {
        Arc::new(tokio::sync::Mutex::new(Database::open_in_memory().unwrap()))
    }

    async fn orchestrator(
        db: &Arc<tokio::sync::Mutex<Database>>,
        remote: Arc<ScriptedPaginator>,
    ) -> Arc<SyncOrchestrator> {
        Arc::new(
            SyncOrchestrator::new(Arc::clone(db), remote, RetryPolicy::immediate(3))
                .await
                .unwrap(),
        )
    }

    async fn stored(db: &Arc<tokio::sync::Mutex<Database>>) -> Vec<Note> {
        let db = db.lock().await;
        SqliteNoteRepository::new(db.connection())
            .fetch_all_ordered(ORDER)
            .unwrap()
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_secs(1));
        assert_eq!(policy.backoff(3), Duration::from_secs(2));
        assert_eq!(policy.backoff(10), Duration::from_secs(5));
        assert_eq!(RetryPolicy::immediate(3).backoff(2), Duration::ZERO);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn full_pass_applies_every_page() {
        let db = shared_db();
        let remote = Arc::new(ScriptedPaginator::new(remote_notes(103), 50));
        let sync = orchestrator(&db, Arc::clone(&remote)).await;

        let report = sync.run_pass(SyncMode::Full).await.unwrap();
        assert_eq!(report.pages_applied, 3);
        assert_eq!(report.notes_applied, 103);
        assert!(!report.cancelled);
        assert_eq!(remote.calls(), 3);

        let status = sync.status().await.unwrap();
        assert_eq!(status.total_notes, 103);
        assert_eq!(status.phase, SyncPhase::Idle);
        assert!(!status.in_progress);
        assert!(status.last_synced_at.is_some());
        assert_eq!(status.cursor.unwrap().id, NoteId::new("memo-0102"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn store_converges_to_remote_after_rerun() {
        let db = shared_db();
        let remote = Arc::new(ScriptedPaginator::new(remote_notes(20), 7));
        let sync = orchestrator(&db, Arc::clone(&remote)).await;

        sync.run_pass(SyncMode::Full).await.unwrap();
        sync.run_pass(SyncMode::Full).await.unwrap();

        let mut expected = remote_notes(20);
        expected.sort_by(|a, b| ORDER.compare(a, b));
        assert_eq!(stored(&db).await, expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transient_failure_is_retried_without_duplicates() {
        let db = shared_db();
        let remote = Arc::new(ScriptedPaginator::new(remote_notes(103), 50).fail_page(1, 2));
        let sync = orchestrator(&db, Arc::clone(&remote)).await;

        let report = sync.run_pass(SyncMode::Full).await.unwrap();
        assert_eq!(report.notes_applied, 103);
        assert_eq!(remote.calls(), 5);
        assert_eq!(sync.status().await.unwrap().total_notes, 103);

        let clean_db = shared_db();
        let clean = orchestrator(
            &clean_db,
            Arc::new(ScriptedPaginator::new(remote_notes(103), 50)),
        )
        .await;
        clean.run_pass(SyncMode::Full).await.unwrap();
        assert_eq!(stored(&db).await, stored(&clean_db).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unauthorized_is_retried_like_other_remote_failures() {
        let db = shared_db();
        let remote = Arc::new(
            ScriptedPaginator::new(remote_notes(10), 50)
                .fail_page(0, 1)
                .unauthorized(),
        );
        let sync = orchestrator(&db, remote).await;

        assert_eq!(sync.run_pass(SyncMode::Full).await.unwrap().notes_applied, 10);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exhausted_retries_fail_and_keep_applied_pages() {
        let db = shared_db();
        let remote = Arc::new(ScriptedPaginator::new(remote_notes(103), 50).fail_page(1, 3));
        let sync = orchestrator(&db, Arc::clone(&remote)).await;

        let error = sync.run_pass(SyncMode::Full).await.unwrap_err();
        assert!(matches!(error, Error::RemoteUnavailable(_)));

        let status = sync.status().await.unwrap();
        assert_eq!(status.phase, SyncPhase::Failed);
        assert_eq!(status.total_notes, 50);
        assert!(status.last_error.unwrap().contains("timed out"));
        assert!(status.last_synced_at.is_none());

        // Failed -> Running is allowed and the next pass converges
        let report = sync.run_pass(SyncMode::Full).await.unwrap();
        assert_eq!(report.notes_applied, 103);
        let status = sync.status().await.unwrap();
        assert_eq!(status.phase, SyncPhase::Idle);
        assert_eq!(status.last_error, None);
        assert_eq!(status.total_notes, 103);

        let db = db.lock().await;
        let runs = SqliteNoteRepository::new(db.connection())
            .list_sync_runs(10)
            .unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].outcome, SyncOutcome::Failed);
        assert_eq!(runs[1].notes_applied, 50);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn storage_failure_is_not_retried() {
        let db = shared_db();
        db.lock()
            .await
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_all BEFORE INSERT ON notes
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();
        let remote = Arc::new(ScriptedPaginator::new(remote_notes(10), 50));
        let sync = orchestrator(&db, Arc::clone(&remote)).await;

        let error = sync.run_pass(SyncMode::Full).await.unwrap_err();
        assert!(matches!(error, Error::Storage(_)));
        assert_eq!(remote.calls(), 1);
        assert_eq!(sync.status().await.unwrap().phase, SyncPhase::Failed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_start_fails_fast_while_running() {
        let db = shared_db();
        let gate = Arc::new(Gate::default());
        let remote = Arc::new(
            ScriptedPaginator::new(remote_notes(10), 50).gated(0, Arc::clone(&gate)),
        );
        let sync = orchestrator(&db, remote).await;

        let handle = sync.start(SyncMode::Full).unwrap();
        gate.reached.notified().await;

        assert!(matches!(sync.start(SyncMode::Full), Err(Error::AlreadySyncing)));
        assert!(matches!(
            sync.run_pass(SyncMode::Incremental).await,
            Err(Error::AlreadySyncing)
        ));
        assert!(sync.status().await.unwrap().in_progress);

        gate.release.notify_one();
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.notes_applied, 10);
        assert!(!sync.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_pass_does_not_stay_running() {
        let db = shared_db();
        let gate = Arc::new(Gate::default());
        let remote = Arc::new(
            ScriptedPaginator::new(remote_notes(10), 50).gated(0, Arc::clone(&gate)),
        );
        let sync = orchestrator(&db, remote).await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(100), sync.run_pass(SyncMode::Full)).await;
        assert!(timed_out.is_err());

        let status = sync.status().await.unwrap();
        assert!(!status.in_progress);
        assert_eq!(status.phase, SyncPhase::Failed);
        assert!(status.last_error.unwrap().contains("aborted"));

        // Let the gated page through on the next pass
        gate.release.notify_one();
        let report = sync.run_pass(SyncMode::Full).await.unwrap();
        assert_eq!(report.notes_applied, 10);
        assert_eq!(sync.status().await.unwrap().phase, SyncPhase::Idle);
    }

    /// Always answers with the same full page and the same cursor
    struct StuckPaginator {
        notes: Vec<Note>,
    }

    #[async_trait::async_trait]
    impl RemotePaginator for StuckPaginator {
        async fn next_page(&self, _cursor: Option<&SyncCursor>) -> Result<RemotePage> {
            Ok(RemotePage {
                notes: self.notes.clone(),
                next_cursor: self.notes.last().map(SyncCursor::after),
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn non_advancing_cursor_fails_the_pass() {
        let db = shared_db();
        let remote = Arc::new(StuckPaginator {
            notes: remote_notes(5),
        });
        let sync = Arc::new(
            SyncOrchestrator::new(Arc::clone(&db), remote, RetryPolicy::immediate(3))
                .await
                .unwrap(),
        );

        let error = sync.run_pass(SyncMode::Full).await.unwrap_err();
        assert!(matches!(error, Error::RemoteUnavailable(_)));

        let status = sync.status().await.unwrap();
        assert_eq!(status.phase, SyncPhase::Failed);
        assert_eq!(status.total_notes, 5);
        assert!(status.last_synced_at.is_none());
        assert!(status.last_error.unwrap().contains("non-advancing cursor"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_stops_at_page_boundary() {
        let db = shared_db();
        let gate = Arc::new(Gate::default());
        let remote = Arc::new(
            ScriptedPaginator::new(remote_notes(103), 50).gated(1, Arc::clone(&gate)),
        );
        let sync = orchestrator(&db, remote).await;
        assert!(!sync.cancel());

        let handle = sync.start(SyncMode::Full).unwrap();
        gate.reached.notified().await;
        assert!(sync.cancel());
        gate.release.notify_one();

        let report = handle.await.unwrap().unwrap();
        assert!(report.cancelled);
        assert_eq!(report.pages_applied, 1);

        let status = sync.status().await.unwrap();
        assert_eq!(status.phase, SyncPhase::Idle);
        assert_eq!(status.total_notes, 50);
        assert!(status.last_synced_at.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn incremental_pass_resumes_after_newest_note() {
        let db = shared_db();
        let remote = Arc::new(ScriptedPaginator::new(remote_notes(30), 10));
        let sync = orchestrator(&db, Arc::clone(&remote)).await;
        sync.run_pass(SyncMode::Full).await.unwrap();

        let mut notes = remote_notes(35);
        notes[3].content = "edited".into();
        notes[3].updated_at = 1_800_000_000_000;
        remote.replace_notes(notes);

        let report = sync.run_pass(SyncMode::Incremental).await.unwrap();
        assert_eq!(report.notes_applied, 6);
        assert_eq!(sync.status().await.unwrap().total_notes, 35);

        let db = db.lock().await;
        let edited = SqliteNoteRepository::new(db.connection())
            .get(&NoteId::new("memo-0003"))
            .unwrap()
            .unwrap();
        assert_eq!(edited.content, "edited");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_remote_completes_with_empty_store() {
        let db = shared_db();
        let remote = Arc::new(ScriptedPaginator::new(Vec::new(), 50));
        let sync = orchestrator(&db, remote).await;

        let report = sync.run_pass(SyncMode::Full).await.unwrap();
        assert_eq!(report.pages_applied, 1);
        assert_eq!(report.notes_applied, 0);
        assert_eq!(report.cursor, None);

        let status = sync.status().await.unwrap();
        assert_eq!(status.total_notes, 0);
        assert!(status.last_synced_at.is_some());
        assert_eq!(
            SqliteNoteRepository::new(db.lock().await.connection())
                .list(ORDER, PageOffset::ZERO, 10)
                .unwrap(),
            Vec::new()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn last_synced_at_survives_restart() {
        let db = shared_db();
        let remote = Arc::new(ScriptedPaginator::new(remote_notes(5), 50));
        let first = orchestrator(&db, Arc::clone(&remote)).await;
        first.run_pass(SyncMode::Full).await.unwrap();
        let synced_at = first.status().await.unwrap().last_synced_at.unwrap();

        let restarted = orchestrator(&db, remote).await;
        let restored = restarted.status().await.unwrap().last_synced_at.unwrap();
        assert_eq!(restored.timestamp_millis(), synced_at.timestamp_millis());
    }
}
