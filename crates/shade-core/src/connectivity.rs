//! Network reachability signal.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Class of the interface currently carrying traffic
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterfaceKind {
    Wifi,
    Cellular,
    Ethernet,
    Loopback,
    Other,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectivityStatus {
    pub connected: bool,
    pub interface: Option<InterfaceKind>,
}

impl ConnectivityStatus {
    pub const OFFLINE: Self = Self {
        connected: false,
        interface: None,
    };

    #[must_use]
    pub const fn online(interface: Option<InterfaceKind>) -> Self {
        Self {
            connected: true,
            interface,
        }
    }
}

/// Publishes connectivity changes. Setting an unchanged status emits nothing,
/// so every observed change is a real flip.
#[derive(Clone, Debug)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<ConnectivityStatus>>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(ConnectivityStatus::OFFLINE)
    }
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(initial: ConnectivityStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current_status(&self) -> ConnectivityStatus {
        *self.tx.borrow()
    }

    pub fn observe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.tx.subscribe()
    }

    /// Publish `status`; returns whether it differed from the previous one.
    pub fn set_status(&self, status: ConnectivityStatus) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            tracing::info!(
                "Connectivity changed: connected={} interface={:?}",
                status.connected,
                status.interface
            );
        }
        changed
    }

    pub fn set_connected(&self, connected: bool) -> bool {
        self.set_status(if connected {
            ConnectivityStatus::online(None)
        } else {
            ConnectivityStatus::OFFLINE
        })
    }

    /// Probe `addr` with a TCP connect every `interval` and publish the outcome.
    ///
    /// The task ends when the returned handle is aborted.
    pub fn spawn_tcp_probe(&self, addr: SocketAddr, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        let timeout = interval.min(MAX_PROBE_TIMEOUT);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.set_status(probe_tcp(addr, timeout).await);
            }
        })
    }
}

/// One reachability check: can a TCP connection to `addr` open within `timeout`?
pub async fn probe_tcp(addr: SocketAddr, timeout: Duration) -> ConnectivityStatus {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => ConnectivityStatus::online(Some(if addr.ip().is_loopback() {
            InterfaceKind::Loopback
        } else {
            InterfaceKind::Other
        })),
        Ok(Err(error)) => {
            tracing::debug!("Probe of {} failed: {}", addr, error);
            ConnectivityStatus::OFFLINE
        }
        Err(_) => {
            tracing::debug!("Probe of {} timed out", addr);
            ConnectivityStatus::OFFLINE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unchanged_status_is_not_republished() {
        let monitor = ConnectivityMonitor::default();
        let mut rx = monitor.observe();

        assert!(!monitor.set_connected(false));
        assert!(!rx.has_changed().unwrap());

        assert!(monitor.set_connected(true));
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().connected);

        assert!(!monitor.set_connected(true));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn interface_change_counts_as_a_change() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::online(Some(InterfaceKind::Wifi)));
        assert!(monitor.set_status(ConnectivityStatus::online(Some(InterfaceKind::Cellular))));
        assert_eq!(
            monitor.current_status().interface,
            Some(InterfaceKind::Cellular)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn probe_of_closed_port_is_offline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let status = probe_tcp(addr, Duration::from_secs(1)).await;
        assert_eq!(status, ConnectivityStatus::OFFLINE);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tcp_probe_reports_reachable_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let monitor = ConnectivityMonitor::default();
        let mut rx = monitor.observe();

        let probe = monitor.spawn_tcp_probe(addr, Duration::from_millis(50));
        let status = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|status| status.connected),
        )
        .await
        .unwrap()
        .map(|status| *status)
        .unwrap();
        probe.abort();

        assert_eq!(status.interface, Some(InterfaceKind::Loopback));
    }
}
