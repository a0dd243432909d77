use std::fmt::Write as _;

use flomo_core::models::{SyncPhase, SyncRun};
use flomo_core::SyncStatus;
use serde::Serialize;

use crate::commands::common::{format_sync_timestamp, open_local};
use crate::config::Settings;
use crate::error::CliError;

const RECENT_RUNS: usize = 5;

#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    db_path: String,
    #[serde(flatten)]
    status: &'a SyncStatus,
    recent_runs: &'a [SyncRun],
}

pub async fn run_status(as_json: bool, settings: &Settings) -> Result<(), CliError> {
    let service = open_local(settings).await?;
    let status = service.get_sync_status().await?;
    let runs = service.list_sync_runs(RECENT_RUNS).await?;

    if as_json {
        let output = StatusOutput {
            db_path: settings.db_path.display().to_string(),
            status: &status,
            recent_runs: &runs,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Database: {}", settings.db_path.display());
    for line in format_status_lines(&status, &runs) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(status: &SyncStatus, runs: &[SyncRun]) -> Vec<String> {
    let mut lines = vec![format!("Memos: {}", status.total_notes)];

    lines.push(status.last_synced_at.map_or_else(
        || "Last synced: never".to_string(),
        |synced_at| format!("Last synced: {}", synced_at.format("%Y-%m-%d %H:%M:%S UTC")),
    ));
    if status.phase == SyncPhase::Failed {
        if let Some(error) = &status.last_error {
            lines.push(format!("Last error: {error}"));
        }
    }

    if !runs.is_empty() {
        lines.push("Recent runs:".to_string());
        for run in runs {
            let mut line = format!(
                "  {}  {:<11}  {:<9}  {} memos",
                format_sync_timestamp(run.finished_at),
                run.mode.as_str(),
                run.outcome.as_str(),
                run.notes_applied
            );
            if let Some(error) = &run.error {
                let _ = write!(line, "  ({error})");
            }
            lines.push(line);
        }
    }

    lines
}
