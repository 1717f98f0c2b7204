//! Reconciliation of the remote user document with the local card cache.
//!
//! [`SyncEngine`] owns the subscription lifecycle and applies every snapshot
//! as a full replace of both its in-memory view and the [`CardStore`].
//! Identity, connectivity and snapshots are three independent producers
//! feeding one consumer loop, which owns all mutable engine state.
//!
//! [`CardStore`]: crate::db::CardStore

mod engine;
mod session;
mod snapshot;

use thiserror::Error;

use crate::remote::RemoteError;

pub use engine::{EngineState, SyncEngine, SyncHandle};
pub use session::{SyncPhase, SyncSession};
pub use snapshot::cards_from_snapshot;

/// Errors surfaced to callers of [`SyncHandle`] mutations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("No user is signed in")]
    SignedOut,

    #[error("Cannot delete cards while offline")]
    Offline,

    #[error("Invalid card: {0}")]
    InvalidCard(String),

    #[error("Sync engine has stopped")]
    EngineStopped,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub type SyncResult<T> = Result<T, SyncError>;
