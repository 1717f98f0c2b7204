//! Per-user subscription bookkeeping.

use crate::models::UserId;
use crate::remote::SubscriptionHandle;

/// Lifecycle phase of the remote subscription
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPhase {
    /// No user, or a user but offline
    #[default]
    Idle,
    /// Subscription requested, no snapshot applied yet
    Subscribing,
    /// At least one snapshot applied
    Live,
}

/// Process-local sync session; replaced, never mutated, when the user changes.
#[derive(Debug, Default)]
pub struct SyncSession {
    active_user_id: Option<UserId>,
    subscription: Option<SubscriptionHandle>,
    epoch: u64,
    phase: SyncPhase,
    last_snapshot_card_count: usize,
}

impl SyncSession {
    #[must_use]
    pub fn for_user(user_id: Option<UserId>) -> Self {
        Self {
            active_user_id: user_id,
            ..Self::default()
        }
    }

    pub const fn active_user_id(&self) -> Option<&UserId> {
        self.active_user_id.as_ref()
    }

    pub const fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    pub const fn last_snapshot_card_count(&self) -> usize {
        self.last_snapshot_card_count
    }

    pub const fn is_subscription_open(&self) -> bool {
        self.subscription.is_some()
    }

    /// Whether a subscription for exactly `user_id` is already open.
    pub fn is_open_for(&self, user_id: &UserId) -> bool {
        self.is_subscription_open() && self.active_user_id.as_ref() == Some(user_id)
    }

    /// Epoch whose snapshots may still be applied, if any.
    pub const fn accepting_epoch(&self) -> Option<u64> {
        if self.subscription.is_some() {
            Some(self.epoch)
        } else {
            None
        }
    }

    pub(crate) fn begin_subscribing(&mut self, epoch: u64) {
        self.epoch = epoch;
        self.phase = SyncPhase::Subscribing;
    }

    pub(crate) fn attach(&mut self, handle: SubscriptionHandle) {
        self.subscription = Some(handle);
    }

    /// Close the session's subscription; returns the handle to release.
    pub(crate) fn detach(&mut self) -> Option<SubscriptionHandle> {
        self.phase = SyncPhase::Idle;
        self.subscription.take()
    }

    pub(crate) fn record_snapshot(&mut self, card_count: usize) {
        self.phase = SyncPhase::Live;
        self.last_snapshot_card_count = card_count;
    }
}
