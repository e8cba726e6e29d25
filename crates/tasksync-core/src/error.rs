//! Error types for tasksync-core

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias using tasksync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tasksync-core operations
///
/// Remote exchange failures are not here: they surface as per-item outcomes
/// (see [`crate::sync::ItemOutcome`]) rather than as errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Task not found (or already deleted)
    #[error("Task not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid sync configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Another sync cycle holds the lease
    #[error("A sync cycle is already in progress")]
    SyncInProgress,
}
