use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shade_core::Error),
    #[error(transparent)]
    Sync(#[from] shade_core::SyncError),
    #[error(transparent)]
    Remote(#[from] shade_core::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Colour name cannot be empty")]
    EmptyColourName,
    #[error("Card ID cannot be empty")]
    EmptyCardId,
    #[error("Card not found for id/prefix: {0}")]
    CardNotFound(String),
    #[error("{0}")]
    AmbiguousCardId(String),
    #[error("Could not resolve probe address: {0}")]
    ProbeAddress(String),
    #[error(
        "Remote sync is not configured. Set SHADE_FIRESTORE_PROJECT and SHADE_USER_ID (and SHADE_ID_TOKEN when rules require auth)."
    )]
    SyncNotConfigured,
}
