//! Error types for shade-core

use thiserror::Error;

/// Result type alias using shade-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the local side of shade-core: the card cache and its I/O.
///
/// Remote and sync failures have their own types in [`crate::remote`] and
/// [`crate::sync`].
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
