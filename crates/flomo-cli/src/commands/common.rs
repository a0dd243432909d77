use std::sync::Arc;

use chrono::Utc;
use flomo_core::remote::FlomoClient;
use flomo_core::services::MirrorService;
use flomo_core::{Note, QueryPage};
use serde::Serialize;

use crate::config::Settings;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub preview: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
    pub tags: Vec<String>,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotePageOutput {
    pub items: Vec<NoteListItem>,
    pub has_more: bool,
    pub next_offset: Option<usize>,
}

/// Open the store without a remote; enough for every read-only command.
pub async fn open_local(settings: &Settings) -> Result<MirrorService, CliError> {
    Ok(MirrorService::open_path(settings.db_path.clone()).await?)
}

/// Open the store with the flomo client attached.
pub async fn open_with_remote(settings: &Settings) -> Result<MirrorService, CliError> {
    let remote = FlomoClient::new(settings.remote_config()?)?;
    let service = open_local(settings)
        .await?
        .with_remote(Arc::new(remote), settings.retry_policy())
        .await?;
    Ok(service)
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();

    NoteListItem {
        id: note.id.to_string(),
        preview: note_preview(note, 80),
        content: note.content.clone(),
        created_at: note.created_at,
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, now_ms),
        tags: note.tags.clone(),
        url: note.url.clone(),
    }
}

pub fn page_to_output(page: &QueryPage) -> NotePageOutput {
    NotePageOutput {
        items: page.items.iter().map(note_to_list_item).collect(),
        has_more: page.has_more,
        next_offset: page.next_offset.map(flomo_core::models::PageOffset::get),
    }
}

pub fn print_page(page: &QueryPage, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&page_to_output(page))?);
        return Ok(());
    }

    if page.items.is_empty() {
        println!("No memos found.");
        return Ok(());
    }

    for line in format_note_lines(&page.items) {
        println!("{line}");
    }
    if let Some(next) = page.next_offset {
        println!("... more with --offset {}", next.get());
    }
    Ok(())
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();

    notes
        .iter()
        .map(|note| {
            let tags = render_tags(note);
            let relative = format_relative_time(note.updated_at, now_ms);
            let preview = note_preview(note, 60);
            if tags.is_empty() {
                format!("{:<12}  {relative:>8}  {preview}", note.id)
            } else {
                format!("{:<12}  {relative:>8}  {preview}  {tags}", note.id)
            }
        })
        .collect()
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.content.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(note: &Note) -> String {
    note.tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySearchQuery)
    } else {
        Ok(trimmed.to_string())
    }
}
