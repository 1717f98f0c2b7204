//! In-process ledger with live fan-out and fault injection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{json, Value};

use super::{
    find_saved_entry, DocumentSnapshot, RemoteError, RemoteLedger, RemoteResult, SnapshotSink,
    SubscriptionHandle,
};
use crate::models::{Card, RemoteCard, UserId, SAVED_COLOURS_FIELD};

#[derive(Default)]
struct LedgerState {
    documents: HashMap<UserId, Value>,
    subscriptions: HashMap<SubscriptionHandle, (UserId, SnapshotSink)>,
    next_handle: u64,
    subscribe_count: usize,
    fail_next_upsert: Option<RemoteError>,
    fail_next_remove: Option<RemoteError>,
    fail_next_subscribe: Option<RemoteError>,
}

impl LedgerState {
    fn snapshot_of(&self, user_id: &UserId) -> DocumentSnapshot {
        self.documents
            .get(user_id)
            .map_or(DocumentSnapshot::Missing, |fields| {
                DocumentSnapshot::Exists(fields.clone())
            })
    }

    fn broadcast(&mut self, user_id: &UserId, snapshot: &DocumentSnapshot) {
        self.subscriptions.retain(|_, (subscriber, sink)| {
            if *subscriber != *user_id {
                return true;
            }
            sink.deliver(snapshot.clone())
        });
    }

    fn publish(&mut self, user_id: &UserId) {
        let snapshot = self.snapshot_of(user_id);
        self.broadcast(user_id, &snapshot);
    }
}

/// A ledger that keeps every user document in memory.
///
/// Writes are applied and fanned out to subscribers while holding one lock, so
/// subscribers observe changes in write order.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current fields of a user's document.
    pub fn document(&self, user_id: &UserId) -> Option<Value> {
        self.lock().documents.get(user_id).cloned()
    }

    /// Overwrite a user's document with raw fields and notify subscribers.
    pub fn replace_document(&self, user_id: &UserId, fields: Value) {
        let mut state = self.lock();
        state.documents.insert(user_id.clone(), fields);
        state.publish(user_id);
    }

    /// Delete a user's document and notify subscribers.
    pub fn remove_document(&self, user_id: &UserId) {
        let mut state = self.lock();
        state.documents.remove(user_id);
        state.publish(user_id);
    }

    /// Push an error snapshot to the user's subscribers.
    pub fn push_error(&self, user_id: &UserId, error: RemoteError) {
        self.lock()
            .broadcast(user_id, &DocumentSnapshot::Failed(error));
    }

    pub fn fail_next_upsert(&self, error: RemoteError) {
        self.lock().fail_next_upsert = Some(error);
    }

    pub fn fail_next_remove(&self, error: RemoteError) {
        self.lock().fail_next_remove = Some(error);
    }

    pub fn fail_next_subscribe(&self, error: RemoteError) {
        self.lock().fail_next_subscribe = Some(error);
    }

    /// Number of `subscribe` calls that succeeded so far.
    pub fn subscribe_count(&self) -> usize {
        self.lock().subscribe_count
    }

    /// Number of subscriptions currently open.
    pub fn open_subscriptions(&self) -> usize {
        self.lock().subscriptions.len()
    }
}

impl RemoteLedger for MemoryLedger {
    async fn upsert_card(&self, user_id: &UserId, card: &Card) -> RemoteResult<()> {
        let mut state = self.lock();
        if let Some(error) = state.fail_next_upsert.take() {
            return Err(error);
        }

        let entry = serde_json::to_value(RemoteCard::from(card))
            .map_err(|error| RemoteError::Decode(error.to_string()))?;

        let fields = state
            .documents
            .entry(user_id.clone())
            .or_insert_with(|| json!({}));
        let Some(object) = fields.as_object_mut() else {
            return Err(RemoteError::Rejected {
                status: 400,
                message: "document is not a map".to_string(),
            });
        };
        let saved = object
            .entry(SAVED_COLOURS_FIELD)
            .or_insert_with(|| Value::Array(Vec::new()));
        let Some(array) = saved.as_array_mut() else {
            return Err(RemoteError::Rejected {
                status: 400,
                message: format!("{SAVED_COLOURS_FIELD} is not an array"),
            });
        };

        if array.contains(&entry) {
            return Ok(());
        }
        array.push(entry);
        state.publish(user_id);
        Ok(())
    }

    async fn remove_card(&self, user_id: &UserId, card: &Card) -> RemoteResult<()> {
        let mut state = self.lock();
        if let Some(error) = state.fail_next_remove.take() {
            return Err(error);
        }

        let Some(fields) = state.documents.get_mut(user_id) else {
            return Ok(());
        };
        let Some(stored) = find_saved_entry(fields, card.id.as_str()).cloned() else {
            tracing::debug!("Card {} not present remotely; nothing to remove", card.id);
            return Ok(());
        };

        if let Some(array) = fields
            .get_mut(SAVED_COLOURS_FIELD)
            .and_then(Value::as_array_mut)
        {
            array.retain(|entry| entry != &stored);
        }
        state.publish(user_id);
        Ok(())
    }

    async fn subscribe(
        &self,
        user_id: &UserId,
        sink: SnapshotSink,
    ) -> RemoteResult<SubscriptionHandle> {
        let mut state = self.lock();
        if let Some(error) = state.fail_next_subscribe.take() {
            return Err(error);
        }

        state.next_handle += 1;
        state.subscribe_count += 1;
        let handle = SubscriptionHandle(state.next_handle);

        sink.deliver(state.snapshot_of(user_id));
        state.subscriptions.insert(handle, (user_id.clone(), sink));
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.lock().subscriptions.remove(&handle);
    }
}
