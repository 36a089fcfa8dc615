use std::io;

use fieldtime_core::clock::ClockError;
use fieldtime_core::sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fieldtime_core::Error),
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Entry ID cannot be empty")]
    EmptyEntryId,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Profile '{0}' has no technician identity. Run `fieldtime config init --user-id <ID> --technician <NAME>`."
    )]
    MissingIdentity(String),
    #[error("No API token. Pass --token or set FIELDTIME_TOKEN to enable `fieldtime sync`.")]
    MissingToken,
}
