//! Error types for flomo-core

use thiserror::Error;

/// Result type alias using flomo-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in flomo-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local store failure (disk full, corruption, bad schema). Never retried.
    #[error("Storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Remote source could not be reached, timed out, or answered garbage
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Remote source rejected the token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A sync pass is already running
    #[error("A sync pass is already in progress")]
    AlreadySyncing,

    /// Rejected query arguments (bad enum, negative offset, bad limit)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether a sync pass may retry the page fetch that produced this error.
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_) | Self::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_are_retryable() {
        assert!(Error::RemoteUnavailable("timeout".into()).is_remote());
        assert!(Error::Unauthorized("bad token".into()).is_remote());
        assert!(!Error::AlreadySyncing.is_remote());
        assert!(!Error::InvalidQuery("limit".into()).is_remote());
    }

    #[test]
    fn storage_error_message_names_the_failure() {
        let error = Error::from(rusqlite::Error::InvalidQuery);
        assert!(error.to_string().starts_with("Storage failure"));
    }
}
