//! Remote ledger: the authoritative per-user document store.
//!
//! A ledger stores one document per user at `Users/{userId}` whose
//! `savedColours` field is an array of card maps. Live subscriptions push a
//! full snapshot of the document on every change through a [`SnapshotSink`].

mod firestore;
mod memory;

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{Card, UserId};

pub use firestore::{FirestoreConfig, FirestoreLedger};
pub use memory::MemoryLedger;

/// Collection holding one document per user.
pub const USERS_COLLECTION: &str = "Users";

/// Errors reported by a remote ledger
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Network unreachable, timeout, or a transient server failure
    #[error("Remote store unreachable: {0}")]
    Transport(String),

    /// The signed-in user may not read or write this document
    #[error("Permission denied by remote store: {0}")]
    Permission(String),

    /// The remote returned a payload we could not read
    #[error("Malformed remote payload: {0}")]
    Decode(String),

    /// Any other refusal
    #[error("Remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// One push from a live subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSnapshot {
    /// The document exists; carries its fields as plain JSON.
    Exists(serde_json::Value),
    /// The document does not exist (nothing saved yet).
    Missing,
    /// The subscription reported an error instead of data.
    Failed(RemoteError),
}

/// A snapshot tagged with the epoch of the subscription that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEvent {
    pub epoch: u64,
    pub snapshot: DocumentSnapshot,
}

/// Producer end of a subscription's snapshot channel.
///
/// Every snapshot is tagged with the epoch the consumer assigned to the
/// subscription, so the consumer can drop anything from a torn-down one.
#[derive(Debug, Clone)]
pub struct SnapshotSink {
    epoch: u64,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
}

impl SnapshotSink {
    pub const fn new(epoch: u64, tx: mpsc::UnboundedSender<SnapshotEvent>) -> Self {
        Self { epoch, tx }
    }

    /// A sink paired with a fresh receiver.
    pub fn channel(epoch: u64) -> (Self, mpsc::UnboundedReceiver<SnapshotEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(epoch, tx), rx)
    }

    /// Push a snapshot. Never blocks; returns `false` once the consumer is gone.
    pub fn deliver(&self, snapshot: DocumentSnapshot) -> bool {
        self.tx
            .send(SnapshotEvent {
                epoch: self.epoch,
                snapshot,
            })
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Opaque handle of an open subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub(crate) u64);

impl SubscriptionHandle {
    /// Ledger implementations mint handles from their own counters.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Client for the remote document store.
pub trait RemoteLedger: Send + Sync + 'static {
    /// Set-union append of `card` to `savedColours`. Re-adding an identical
    /// card is a no-op.
    fn upsert_card(
        &self,
        user_id: &UserId,
        card: &Card,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Remove the stored element whose `id` matches `card.id`. Succeeds without
    /// change when no element matches.
    fn remove_card(
        &self,
        user_id: &UserId,
        card: &Card,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Open a live subscription that pushes full snapshots into `sink`.
    fn subscribe(
        &self,
        user_id: &UserId,
        sink: SnapshotSink,
    ) -> impl Future<Output = RemoteResult<SubscriptionHandle>> + Send;

    /// Close a subscription. Safe to call on an already-closed handle.
    fn unsubscribe(&self, handle: SubscriptionHandle);
}

/// Find the stored `savedColours` element whose `id` equals `card_id`.
pub(crate) fn find_saved_entry<'a>(
    fields: &'a serde_json::Value,
    card_id: &str,
) -> Option<&'a serde_json::Value> {
    fields
        .get(crate::models::SAVED_COLOURS_FIELD)?
        .as_array()?
        .iter()
        .find(|entry| entry.get("id").and_then(serde_json::Value::as_str) == Some(card_id))
}
