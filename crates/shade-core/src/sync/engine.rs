//! The reconciliation loop and its handle.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use super::session::{SyncPhase, SyncSession};
use super::snapshot::cards_from_snapshot;
use super::{SyncError, SyncResult};
use crate::connectivity::{ConnectivityMonitor, ConnectivityStatus};
use crate::db::CardStore;
use crate::error::Result;
use crate::identity::IdentitySignal;
use crate::models::{Card, UserId};
use crate::remote::{RemoteLedger, SnapshotEvent, SnapshotSink};
use crate::search::{select_display_cards, CardQuery};

/// Observable engine state, republished after every transition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineState {
    pub phase: SyncPhase,
    pub user_id: Option<UserId>,
    pub connected: bool,
    /// Authoritative in-memory view, in received order
    pub cards: Vec<Card>,
    pub last_snapshot_card_count: usize,
    pub epoch: u64,
}

enum Command {
    Shutdown(oneshot::Sender<()>),
}

/// Single owner of subscription state, the in-memory view and the store swap.
pub struct SyncEngine<L, S> {
    ledger: Arc<L>,
    store: Arc<S>,
    identity: watch::Receiver<Option<UserId>>,
    connectivity: watch::Receiver<ConnectivityStatus>,
    snapshot_tx: mpsc::UnboundedSender<SnapshotEvent>,
    snapshot_rx: mpsc::UnboundedReceiver<SnapshotEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<EngineState>,
    session: SyncSession,
    view: Vec<Card>,
    connected: bool,
    next_epoch: u64,
}

impl<L, S> SyncEngine<L, S>
where
    L: RemoteLedger,
    S: CardStore + 'static,
{
    /// Start the engine on the current tokio runtime.
    pub fn spawn(
        ledger: Arc<L>,
        store: Arc<S>,
        identity: &IdentitySignal,
        connectivity: &ConnectivityMonitor,
    ) -> SyncHandle<L, S> {
        let (engine, handle) = Self::new(ledger, store, identity, connectivity);
        tokio::spawn(engine.run());
        handle
    }

    fn new(
        ledger: Arc<L>,
        store: Arc<S>,
        identity: &IdentitySignal,
        connectivity: &ConnectivityMonitor,
    ) -> (Self, SyncHandle<L, S>) {
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(EngineState::default());

        let handle = SyncHandle {
            ledger: Arc::clone(&ledger),
            store: Arc::clone(&store),
            identity: identity.observe(),
            connectivity: connectivity.observe(),
            commands: command_tx,
            state: state_rx,
        };
        let engine = Self {
            ledger,
            store,
            identity: identity.observe(),
            connectivity: connectivity.observe(),
            snapshot_tx,
            snapshot_rx,
            commands,
            state_tx,
            session: SyncSession::default(),
            view: Vec::new(),
            connected: false,
            next_epoch: 0,
        };
        (engine, handle)
    }

    async fn run(mut self) {
        tracing::debug!("Sync engine started");
        self.reconcile().await;

        let mut identity_open = true;
        let mut connectivity_open = true;
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    self.commands.close();
                    self.teardown();
                    self.publish();
                    if let Some(Command::Shutdown(ack)) = command {
                        let _ = ack.send(());
                    }
                    break;
                }
                changed = self.identity.changed(), if identity_open => {
                    if changed.is_err() {
                        tracing::debug!("Identity signal closed");
                        identity_open = false;
                    }
                    self.reconcile().await;
                }
                changed = self.connectivity.changed(), if connectivity_open => {
                    if changed.is_err() {
                        tracing::debug!("Connectivity signal closed");
                        connectivity_open = false;
                    }
                    self.reconcile().await;
                }
                Some(event) = self.snapshot_rx.recv() => {
                    self.on_snapshot(event).await;
                }
            }
        }
        tracing::debug!("Sync engine stopped");
    }

    /// Bring the subscription in line with the current identity and connectivity.
    async fn reconcile(&mut self) {
        let user_id = self.identity.borrow_and_update().clone();
        self.connected = self.connectivity.borrow_and_update().connected;

        if self.session.active_user_id() != user_id.as_ref() {
            self.teardown();
            if let Some(previous) = self.session.active_user_id() {
                tracing::info!("Closing sync session for {}", previous);
            }
            self.session = SyncSession::for_user(user_id.clone());
            self.view.clear();
        }

        match user_id {
            Some(user_id) if self.connected => {
                if self.session.is_open_for(&user_id) {
                    self.publish();
                    return;
                }
                self.teardown();
                self.open(user_id).await;
            }
            _ => self.teardown(),
        }
        self.publish();
    }

    async fn open(&mut self, user_id: UserId) {
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        self.session.begin_subscribing(epoch);
        self.publish();

        tracing::info!("Subscribing to {} (epoch {})", user_id, epoch);
        let sink = SnapshotSink::new(epoch, self.snapshot_tx.clone());
        match self.ledger.subscribe(&user_id, sink).await {
            Ok(handle) => self.session.attach(handle),
            Err(error) => {
                tracing::warn!("Failed to subscribe to {}: {}", user_id, error);
                self.session.detach();
            }
        }
    }

    /// Close the open subscription, if any. Snapshots already queued for it
    /// are rejected by their epoch afterwards.
    fn teardown(&mut self) {
        if let Some(handle) = self.session.detach() {
            tracing::info!("Closed subscription (epoch {})", self.session.epoch());
            self.ledger.unsubscribe(handle);
        }
    }

    async fn on_snapshot(&mut self, first: SnapshotEvent) {
        let Some(current) = self.session.accepting_epoch() else {
            tracing::debug!("Discarded snapshot from closed epoch {}", first.epoch);
            return;
        };

        // Latest wins: only the newest queued snapshot of the current epoch is applied.
        let mut latest = None;
        let mut stale = 0usize;
        let mut superseded = 0usize;
        let mut next = Some(first);
        while let Some(event) = next {
            if event.epoch == current {
                if latest.replace(event).is_some() {
                    superseded += 1;
                }
            } else {
                stale += 1;
            }
            next = self.snapshot_rx.try_recv().ok();
        }

        if stale > 0 {
            tracing::debug!("Discarded {} stale snapshots", stale);
        }
        if superseded > 0 {
            tracing::debug!("Coalesced {} superseded snapshots", superseded);
        }
        if let Some(event) = latest {
            self.apply(&event).await;
        }
    }

    async fn apply(&mut self, event: &SnapshotEvent) {
        let cards = cards_from_snapshot(&event.snapshot);
        tracing::debug!(
            "Applying snapshot with {} cards (epoch {})",
            cards.len(),
            event.epoch
        );

        if let Err(error) = self.store.replace_all(&cards).await {
            tracing::warn!("Failed to write snapshot to card store: {}", error);
        }
        self.session.record_snapshot(cards.len());
        self.view = cards;
        self.publish();
    }

    fn publish(&self) {
        let next = EngineState {
            phase: self.session.phase(),
            user_id: self.session.active_user_id().cloned(),
            connected: self.connected,
            cards: self.view.clone(),
            last_snapshot_card_count: self.session.last_snapshot_card_count(),
            epoch: self.session.epoch(),
        };
        self.state_tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }
}

/// Caller-side handle: mutations, display reads and shutdown.
pub struct SyncHandle<L, S> {
    ledger: Arc<L>,
    store: Arc<S>,
    identity: watch::Receiver<Option<UserId>>,
    connectivity: watch::Receiver<ConnectivityStatus>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<EngineState>,
}

impl<L, S> Clone for SyncHandle<L, S> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            store: Arc::clone(&self.store),
            identity: self.identity.clone(),
            connectivity: self.connectivity.clone(),
            commands: self.commands.clone(),
            state: self.state.clone(),
        }
    }
}

impl<L, S> SyncHandle<L, S>
where
    L: RemoteLedger,
    S: CardStore,
{
    pub fn watch_state(&self) -> watch::Receiver<EngineState> {
        self.state.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    fn signed_in_user(&self) -> SyncResult<UserId> {
        if !self.is_running() {
            return Err(SyncError::EngineStopped);
        }
        self.identity.borrow().clone().ok_or(SyncError::SignedOut)
    }

    /// Append `card` to the remote document.
    ///
    /// Local state changes only when the resulting snapshot arrives.
    pub async fn add_card(&self, card: &Card) -> SyncResult<()> {
        let user_id = self.signed_in_user()?;
        if !card.is_valid() {
            return Err(SyncError::InvalidCard(
                "hex code and colour name must not be empty".to_string(),
            ));
        }
        self.ledger.upsert_card(&user_id, card).await?;
        tracing::info!("Added card {} for {}", card.id, user_id);
        Ok(())
    }

    /// Remove `card` from the remote document. Rejected while offline.
    pub async fn delete_card(&self, card: &Card) -> SyncResult<()> {
        let user_id = self.signed_in_user()?;
        if !self.connectivity.borrow().connected {
            return Err(SyncError::Offline);
        }
        self.ledger.remove_card(&user_id, card).await?;
        tracing::info!("Deleted card {} for {}", card.id, user_id);
        Ok(())
    }

    /// Cards to display: the live view while connected, the cache otherwise,
    /// then filtered and sorted by `query`.
    pub async fn display_cards(&self, query: &CardQuery) -> Result<Vec<Card>> {
        let state = self.state();
        let stored = if state.connected {
            Vec::new()
        } else {
            self.store.all().await?
        };
        Ok(query.apply(select_display_cards(
            state.connected,
            &state.cards,
            &stored,
        )))
    }

    /// Tear down the subscription and stop the engine loop.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}
