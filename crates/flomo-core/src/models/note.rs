//! Note model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Remote-assigned note identifier (the memo "slug").
///
/// Ordering is plain byte order, which is also how the store breaks ties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Wrap a remote identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A note mirrored from the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier, immutable
    pub id: NoteId,
    /// Plain text content
    pub content: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms), the sync watermark
    pub updated_at: i64,
    /// Tags in order of first appearance, no duplicates
    pub tags: Vec<String>,
    /// Link back to the note on the remote service
    pub url: Option<String>,
}

impl Note {
    /// Create a note without tags or link
    #[must_use]
    pub fn new(
        id: impl Into<NoteId>,
        content: impl Into<String>,
        created_at: i64,
        updated_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            created_at,
            updated_at,
            tags: Vec::new(),
            url: None,
        }
    }

    /// Replace the tag set, normalizing it
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    /// Set the remote link
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Creation time as a UTC date-time
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_at)
    }

    /// Update time as a UTC date-time
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.updated_at)
    }

    /// Case-insensitive substring match against content or any tag.
    ///
    /// `query` is folded here; callers pass the raw user input.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let folded = fold_case(query);
        fold_case(&self.content).contains(&folded)
            || self.tags.iter().any(|tag| fold_case(tag).contains(&folded))
    }
}

/// Normalize a tag list into an ordered set.
///
/// Tags are trimmed, empty entries dropped, and later duplicates removed so
/// the first occurrence keeps its position.
#[must_use]
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(Into::into)
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Case folding used by search, shared by the store and in-memory matching.
#[must_use]
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_id_roundtrip() {
        let id: NoteId = "MTIzNDU2".parse().unwrap();
        assert_eq!(id.as_str(), "MTIzNDU2");
        assert_eq!(id.to_string(), "MTIzNDU2");
    }

    #[test]
    fn test_note_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&NoteId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_note_new() {
        let note = Note::new("a1", "Hello world", 1_000, 2_000);
        assert_eq!(note.content, "Hello world");
        assert!(note.tags.is_empty());
        assert!(note.url.is_none());
        assert_eq!(note.created_at, 1_000);
        assert_eq!(note.updated_at, 2_000);
    }

    #[test]
    fn test_normalize_tags_keeps_first_occurrence() {
        let tags = normalize_tags(["work", " ideas ", "work", "", "ideas/rust"]);
        assert_eq!(tags, vec!["work", "ideas", "ideas/rust"]);
    }

    #[test]
    fn test_normalize_tags_is_case_sensitive() {
        let tags = normalize_tags(["Rust", "rust"]);
        assert_eq!(tags, vec!["Rust", "rust"]);
    }

    #[test]
    fn test_matches_query_content_and_tags() {
        let note = Note::new("a1", "Reading Notes on Ownership", 0, 0).with_tags(["Books/Rust"]);
        assert!(note.matches_query("ownership"));
        assert!(note.matches_query("BOOKS/r"));
        assert!(!note.matches_query("python"));
    }

    #[test]
    fn test_matches_query_does_not_span_tags() {
        let note = Note::new("a1", "body", 0, 0).with_tags(["ab", "cd"]);
        assert!(!note.matches_query("bc"));
    }

    #[test]
    fn test_created_at_utc() {
        let note = Note::new("a1", "x", 1_700_000_000_000, 1_700_000_000_000);
        let created = note.created_at_utc().unwrap();
        assert_eq!(created.timestamp_millis(), 1_700_000_000_000);
    }
}
