use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] flomo_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Search query cannot be empty")]
    EmptySearchQuery,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Sync task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error(
        "No flomo token configured. Run `flomo config --token <TOKEN>` or set FLOMO_AUTHORIZATION."
    )]
    TokenNotConfigured,
}
