//! Query request/response types for offset pagination over the local store

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Note;
use crate::error::{Error, Result};

/// Largest page a single list/search call may request.
pub const MAX_PAGE_LIMIT: usize = 1000;

/// Timestamp a listing is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    /// Column name in the notes table
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    const fn key(self, note: &Note) -> i64 {
        match self {
            Self::CreatedAt => note.created_at,
            Self::UpdatedAt => note.updated_at,
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            other => Err(Error::InvalidQuery(format!(
                "order_by must be created_at or updated_at, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(Error::InvalidQuery(format!(
                "order_dir must be asc or desc, got '{other}'"
            ))),
        }
    }
}

/// Total order over notes: the chosen field in the chosen direction, then
/// `id` ascending regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortOrder {
    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// `ORDER BY` clause for the notes table
    pub fn sql(self) -> String {
        format!(
            "{} {}, id ASC",
            self.field.column(),
            self.direction.keyword()
        )
    }

    /// Same ordering as [`SortOrder::sql`], for in-memory note sets.
    pub fn compare(self, a: &Note, b: &Note) -> Ordering {
        let primary = self.field.key(a).cmp(&self.field.key(b));
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Row offset into the local store's ordering.
///
/// Distinct from [`SyncCursor`](super::SyncCursor): offsets are only stable
/// while the store is unchanged, cursors address the remote sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageOffset(usize);

impl PageOffset {
    pub const ZERO: Self = Self(0);

    pub const fn new(offset: usize) -> Self {
        Self(offset)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    /// Offset `count` rows further on
    #[must_use]
    pub const fn advance(self, count: usize) -> Self {
        Self(self.0.saturating_add(count))
    }
}

impl TryFrom<i64> for PageOffset {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        usize::try_from(value)
            .map(Self)
            .map_err(|_| Error::InvalidQuery(format!("offset must be non-negative, got {value}")))
    }
}

/// One validated list/search page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub order: SortOrder,
    pub offset: PageOffset,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(order: SortOrder, offset: PageOffset, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::InvalidQuery("limit must be at least 1".into()));
        }
        if limit > MAX_PAGE_LIMIT {
            return Err(Error::InvalidQuery(format!(
                "limit must be at most {MAX_PAGE_LIMIT}, got {limit}"
            )));
        }
        Ok(Self {
            order,
            offset,
            limit,
        })
    }

    /// Validate raw caller input
    pub fn parse(order_by: &str, order_dir: &str, offset: i64, limit: i64) -> Result<Self> {
        let order = SortOrder::new(order_by.parse()?, order_dir.parse()?);
        let offset = PageOffset::try_from(offset)?;
        let limit = usize::try_from(limit)
            .map_err(|_| Error::InvalidQuery(format!("limit must be non-negative, got {limit}")))?;
        Self::new(order, offset, limit)
    }
}

/// One page of query results. Transient, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryPage {
    pub items: Vec<Note>,
    pub has_more: bool,
    pub next_offset: Option<PageOffset>,
}

impl QueryPage {
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
            next_offset: None,
        }
    }
}
