//! Sync pass bookkeeping: modes, outcomes, status and the run log

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SyncCursor;
use crate::error::Error;

/// Where a pass starts in the remote sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// From the beginning of the remote sequence
    #[default]
    Full,
    /// From the newest note already in the store
    Incremental,
}

impl SyncMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            other => Err(Error::InvalidQuery(format!("unknown sync mode '{other}'"))),
        }
    }
}

/// How a finished pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Completed,
    Cancelled,
    Failed,
}

impl SyncOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for SyncOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Config(format!("unknown sync outcome '{other}'"))),
        }
    }
}

/// Orchestrator state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    #[default]
    Idle,
    Running,
    Failed,
}

/// Recorded sync pass, appended once the pass finishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    /// Log row identifier
    pub id: i64,
    /// Pass start (Unix ms)
    pub started_at: i64,
    /// Pass end (Unix ms)
    pub finished_at: i64,
    pub mode: SyncMode,
    pub outcome: SyncOutcome,
    /// Notes upserted during the pass, duplicates included
    pub notes_applied: u64,
    /// Failure message for failed passes
    pub error: Option<String>,
}

/// Snapshot answered by `get_sync_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub total_notes: u64,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub in_progress: bool,
    pub phase: SyncPhase,
    /// Message of the most recent pass, if that pass failed
    pub last_error: Option<String>,
    /// Cursor after the last fully applied page
    pub cursor: Option<SyncCursor>,
}

/// Summary of one finished pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub pages_applied: u64,
    pub notes_applied: u64,
    pub cancelled: bool,
    pub cursor: Option<SyncCursor>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
