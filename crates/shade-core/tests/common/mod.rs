//! Shared fixtures for engine tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::{json, Value};
use shade_core::remote::{
    DocumentSnapshot, RemoteLedger, RemoteResult, SnapshotSink, SubscriptionHandle,
};
use shade_core::{
    Card, CardId, CardStore, ConnectivityMonitor, ConnectivityStatus, EngineState, IdentitySignal,
    SyncHandle, UserId,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn user(name: &str) -> UserId {
    name.parse().unwrap()
}

pub fn card(id: &str, hex_code: &str, colour_name: &str, created_at: i64) -> Card {
    Card {
        id: CardId::from(id),
        hex_code: hex_code.to_string(),
        colour_name: colour_name.to_string(),
        created_at,
    }
}

/// Raw document fields holding `entries` as `(id, hexCode, colourName)`.
pub fn document(entries: &[(&str, &str, &str)]) -> Value {
    let saved = entries
        .iter()
        .enumerate()
        .map(|(index, (id, hex_code, colour_name))| {
            json!({
                "id": id,
                "hexCode": hex_code,
                "colourName": colour_name,
                "date": 1_700_000_000_000_i64 + i64::try_from(index).unwrap(),
            })
        })
        .collect::<Vec<_>>();
    json!({ "savedColours": saved })
}

pub fn ids(cards: &[Card]) -> Vec<String> {
    cards.iter().map(|card| card.id.to_string()).collect()
}

pub async fn stored_ids(store: &impl CardStore) -> Vec<String> {
    ids(&store.all().await.unwrap())
}

pub fn online() -> ConnectivityMonitor {
    ConnectivityMonitor::new(ConnectivityStatus::online(None))
}

pub fn signed_in(name: &str) -> IdentitySignal {
    IdentitySignal::new(Some(user(name)))
}

/// Wait until the published engine state satisfies `predicate`.
pub async fn wait_for_state<L, S>(
    handle: &SyncHandle<L, S>,
    predicate: impl FnMut(&EngineState) -> bool,
) -> EngineState
where
    L: RemoteLedger,
    S: CardStore,
{
    let mut rx = handle.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for engine state")
        .map(|state| state.clone())
        .expect("engine state channel closed")
}

/// Poll `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never became true");
}

/// Ledger that hands every sink to the test, so snapshots can be pushed on
/// any subscription (including ones the engine already closed).
#[derive(Clone, Default)]
pub struct ManualLedger {
    sinks: Arc<Mutex<Vec<SnapshotSink>>>,
    unsubscribed: Arc<Mutex<Vec<SubscriptionHandle>>>,
}

impl ManualLedger {
    pub fn subscribe_count(&self) -> usize {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn unsubscribed(&self) -> Vec<SubscriptionHandle> {
        self.unsubscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Push `fields` on the `index`-th subscription ever opened.
    pub fn push(&self, index: usize, fields: Value) {
        let sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        sinks[index].deliver(DocumentSnapshot::Exists(fields));
    }
}

impl RemoteLedger for ManualLedger {
    async fn upsert_card(&self, _user_id: &UserId, _card: &Card) -> RemoteResult<()> {
        Ok(())
    }

    async fn remove_card(&self, _user_id: &UserId, _card: &Card) -> RemoteResult<()> {
        Ok(())
    }

    async fn subscribe(
        &self,
        _user_id: &UserId,
        sink: SnapshotSink,
    ) -> RemoteResult<SubscriptionHandle> {
        let mut sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        sinks.push(sink);
        Ok(SubscriptionHandle::new(sinks.len() as u64))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.unsubscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }
}
