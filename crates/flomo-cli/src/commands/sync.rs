use flomo_core::models::SyncReport;
use flomo_core::SyncMode;

use crate::commands::common::open_with_remote;
use crate::config::Settings;
use crate::error::CliError;

pub async fn run_sync(incremental: bool, settings: &Settings) -> Result<(), CliError> {
    let service = open_with_remote(settings).await?;
    let mode = if incremental {
        SyncMode::Incremental
    } else {
        SyncMode::Full
    };

    let mut handle = service.start_sync(mode)?;
    let report = tokio::select! {
        result = &mut handle => result??,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Cancelling after the current page...");
            service.cancel_sync();
            handle.await??
        }
    };

    println!("{}", format_report(&report));
    Ok(())
}

pub fn format_report(report: &SyncReport) -> String {
    let verb = if report.cancelled {
        "Sync cancelled"
    } else {
        "Sync completed"
    };
    let seconds = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;
    format!(
        "{verb} ({}): {} memos in {} pages, {seconds:.1}s",
        report.mode, report.notes_applied, report.pages_applied
    )
}
