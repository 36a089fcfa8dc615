//! Error types for fieldtime-core

use thiserror::Error;

/// Result type alias using fieldtime-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fieldtime-core store operations
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry not found
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A second open session was about to be stored for the same user
    #[error("User {user_id} already has an active entry ({active_id})")]
    ActiveEntryExists {
        /// Owner of both entries
        user_id: String,
        /// The entry that is already open
        active_id: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
