//! Note export rendering shared by every client.
//!
//! Renderers are pure: they format exactly the notes they are given, in the
//! order given. Sorting and limiting happen before this module is called.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Note, NoteId};

const MARKDOWN_TITLE: &str = "# Flomo Memos";
const TABLE_PREVIEW_CHARS: usize = 30;
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Export output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Markdown,
    Table,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
            Self::Table => "txt",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Table => "table",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "table" | "txt" => Ok(Self::Table),
            other => Err(Error::InvalidQuery(format!("unknown export format '{other}'"))),
        }
    }
}

/// How a Markdown export refers back to the remote note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlMode {
    /// The full link
    #[default]
    Full,
    /// Only the note identifier
    Id,
    /// Nothing
    None,
}

impl FromStr for UrlMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "id" => Ok(Self::Id),
            "none" => Ok(Self::None),
            other => Err(Error::InvalidQuery(format!("unknown url mode '{other}'"))),
        }
    }
}

/// Formatting knobs; each format reads the ones it understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// JSON: single line instead of indented
    pub compact: bool,
    /// JSON: timestamps, tags and link. Markdown: header date and tag line.
    pub include_metadata: bool,
    /// Markdown: content blocks only
    pub minimal: bool,
    pub url_mode: UrlMode,
    /// Zone used for human-readable dates
    pub timezone: FixedOffset,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            compact: false,
            include_metadata: true,
            minimal: false,
            url_mode: UrlMode::Full,
            timezone: FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

/// JSON shape of one exported note.
///
/// `id` and `content` are always present; the rest only with metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportNote {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ExportNote {
    #[must_use]
    pub fn from_note(note: &Note, include_metadata: bool) -> Self {
        if !include_metadata {
            return Self {
                id: note.id.to_string(),
                content: note.content.clone(),
                created_at: None,
                updated_at: None,
                tags: None,
                url: None,
            };
        }

        Self {
            id: note.id.to_string(),
            content: note.content.clone(),
            created_at: note.created_at_utc(),
            updated_at: note.updated_at_utc(),
            tags: Some(note.tags.clone()),
            url: note.url.clone(),
        }
    }

    /// Rebuild a note from a metadata export; `None` when timestamps are missing.
    #[must_use]
    pub fn into_note(self) -> Option<Note> {
        let created_at = self.created_at?.timestamp_millis();
        let updated_at = self.updated_at?.timestamp_millis();
        let mut note = Note::new(NoteId::new(self.id), self.content, created_at, updated_at)
            .with_tags(self.tags.unwrap_or_default());
        note.url = self.url;
        Some(note)
    }
}

/// Render notes as a JSON array.
pub fn render_json(notes: &[Note], options: &ExportOptions) -> Result<String> {
    let items = notes
        .iter()
        .map(|note| ExportNote::from_note(note, options.include_metadata))
        .collect::<Vec<_>>();

    let rendered = if options.compact {
        serde_json::to_string(&items)?
    } else {
        serde_json::to_string_pretty(&items)?
    };
    Ok(rendered)
}

/// Render notes as Markdown.
#[must_use]
pub fn render_markdown(notes: &[Note], options: &ExportOptions) -> String {
    if options.minimal {
        return render_minimal_markdown(notes);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{MARKDOWN_TITLE}");

    for (index, note) in notes.iter().enumerate() {
        let number = index + 1;
        output.push('\n');
        if options.include_metadata {
            let _ = writeln!(
                output,
                "## {number}. {}",
                format_local(note.created_at, options.timezone, DATE_TIME_FORMAT)
            );
        } else {
            let _ = writeln!(output, "## {number}");
        }
        output.push('\n');
        let _ = writeln!(output, "{}", note.content.trim());

        match options.url_mode {
            UrlMode::Full => {
                if let Some(url) = &note.url {
                    let _ = writeln!(output, "**Link**: {url}");
                }
            }
            UrlMode::Id => {
                let _ = writeln!(output, "**ID**: {}", note.id);
            }
            UrlMode::None => {}
        }

        if options.include_metadata && !note.tags.is_empty() {
            let _ = writeln!(output, "**Tags**: {}", note.tags.join(", "));
        }

        output.push('\n');
        let _ = writeln!(output, "---");
    }

    output
}

fn render_minimal_markdown(notes: &[Note]) -> String {
    let blocks = notes
        .iter()
        .map(|note| note.content.trim())
        .collect::<Vec<_>>();
    if blocks.is_empty() {
        return String::new();
    }

    let mut output = blocks.join("\n\n");
    output.push('\n');
    output
}

/// Render notes as a fixed-width text table.
#[must_use]
pub fn render_table(notes: &[Note], options: &ExportOptions) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{:>4} | {:<10} | {:<33} | Tags", "#", "Created", "Content");
    let _ = writeln!(output, "{}", "-".repeat(64));

    for (index, note) in notes.iter().enumerate() {
        let _ = writeln!(
            output,
            "{:>4} | {:<10} | {:<33} | {}",
            index + 1,
            format_local(note.created_at, options.timezone, DATE_FORMAT),
            content_preview(&note.content),
            note.tags.join(", ")
        );
    }

    output
}

/// Render notes in the chosen format.
pub fn render_export(notes: &[Note], format: ExportFormat, options: &ExportOptions) -> Result<String> {
    match format {
        ExportFormat::Json => render_json(notes, options),
        ExportFormat::Markdown => Ok(render_markdown(notes, options)),
        ExportFormat::Table => Ok(render_table(notes, options)),
    }
}

/// Default file name for an export written at `now`.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, now: NaiveDateTime) -> String {
    format!(
        "flomo_export_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Single-line preview, cut to the table's content width.
fn content_preview(content: &str) -> String {
    let flattened = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= TABLE_PREVIEW_CHARS {
        return flattened;
    }
    let mut preview = flattened.chars().take(TABLE_PREVIEW_CHARS).collect::<String>();
    preview.push_str("...");
    preview
}

fn format_local(timestamp_ms: i64, timezone: FixedOffset, pattern: &str) -> String {
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.with_timezone(&timezone).format(pattern).to_string(),
    )
}
