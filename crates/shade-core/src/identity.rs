//! Signed-in user signal.

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::UserId;

/// Reports the currently signed-in user, if any.
///
/// Obtaining the identifier is up to the caller (an auth flow, a config value).
#[derive(Clone, Debug)]
pub struct IdentitySignal {
    tx: Arc<watch::Sender<Option<UserId>>>,
}

impl Default for IdentitySignal {
    fn default() -> Self {
        Self::new(None)
    }
}

impl IdentitySignal {
    #[must_use]
    pub fn new(initial: Option<UserId>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<UserId> {
        self.tx.borrow().clone()
    }

    pub fn observe(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }

    /// Publish the signed-in user; returns whether it changed.
    pub fn set_user(&self, user_id: Option<UserId>) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == user_id {
                false
            } else {
                current.clone_from(&user_id);
                true
            }
        });
        if changed {
            match &user_id {
                Some(user_id) => tracing::info!("Signed in as {}", user_id),
                None => tracing::info!("Signed out"),
            }
        }
        changed
    }
}
