//! Observable online/offline state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::probe::ConnectivityProbe;
use crate::sync::SyncReconciler;

/// Capacity of the notice channel.
const NOTICE_CAPACITY: usize = 16;

/// Connectivity as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    #[must_use]
    pub fn from_online(online: bool) -> Self {
        if online { Self::Online } else { Self::Offline }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-visible notice emitted on a real transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkNotice {
    /// Offline to online.
    Reconnected,
    /// Online to offline.
    WentOffline,
}

impl NetworkNotice {
    /// Short message suitable for a toast.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Reconnected => "Back online. Syncing your progress.",
            Self::WentOffline => "You are offline. Downloaded content is still available.",
        }
    }
}

/// Tracks connectivity and announces transitions.
///
/// Cloning shares the underlying channels.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    state: Arc<watch::Sender<Connectivity>>,
    notices: broadcast::Sender<NetworkNotice>,
}

impl NetworkMonitor {
    /// Creates a monitor with a caller-supplied initial state.
    #[must_use]
    pub fn new(initial: Connectivity) -> Self {
        let (state, _) = watch::channel(initial);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            state: Arc::new(state),
            notices,
        }
    }

    /// Creates a monitor whose initial state is read once from `probe`.
    pub async fn from_probe(probe: &dyn ConnectivityProbe) -> Self {
        let initial = Connectivity::from_online(probe.is_online().await);
        info!(%initial, "initial connectivity");
        Self::new(initial)
    }

    #[must_use]
    pub fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    /// Receiver for the state signal.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }

    /// Receiver for transition notices.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<NetworkNotice> {
        self.notices.subscribe()
    }

    /// Feeds an environment event into the monitor.
    ///
    /// Returns the notice emitted, or `None` if the state did not change.
    pub fn observe(&self, online: bool) -> Option<NetworkNotice> {
        let next = Connectivity::from_online(online);
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if !changed {
            debug!(state = %next, "connectivity unchanged");
            return None;
        }

        let notice = match next {
            Connectivity::Online => NetworkNotice::Reconnected,
            Connectivity::Offline => NetworkNotice::WentOffline,
        };
        info!(state = %next, "connectivity changed");
        let _ = self.notices.send(notice);
        Some(notice)
    }

    /// Polls `probe` every `interval` and feeds the result into `observe`.
    pub fn spawn_polling(
        &self,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let online = probe.is_online().await;
                monitor.observe(online);
            }
        })
    }
}

/// Runs a reconciliation after each reconnect until the monitor is dropped.
///
/// Notices that pile up while a reconciliation is in flight are drained
/// together, so a burst of transitions costs one more submission at most.
/// Failures are logged; records stay in the store for the next reconnect.
#[instrument(skip_all)]
pub fn spawn_reconnect_sync(
    monitor: &NetworkMonitor,
    reconciler: Arc<SyncReconciler>,
) -> JoinHandle<()> {
    let mut notices = monitor.notices();
    let state = monitor.watch();
    tokio::spawn(async move {
        loop {
            let mut pending = match notices.recv().await {
                Ok(notice) => PendingNotices::from_notice(notice),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed connectivity notices");
                    PendingNotices::lagged()
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            pending.drain(&mut notices);
            let online = state.borrow().is_online();

            if pending.reconnected && online {
                if pending.coalesced > 0 {
                    debug!(coalesced = pending.coalesced, "coalesced connectivity notices");
                }
                match reconciler.reconcile().await {
                    Ok(report) => info!(
                        records = report.records,
                        modules = report.module_progress,
                        "progress synced after reconnect"
                    ),
                    Err(error) => warn!(error = %error, "progress sync after reconnect failed"),
                }
            }
            if pending.closed {
                break;
            }
        }
        debug!("reconnect sync stopped");
    })
}

/// Notices collected between two reconciliations.
#[derive(Debug, Default)]
struct PendingNotices {
    reconnected: bool,
    coalesced: usize,
    closed: bool,
}

impl PendingNotices {
    fn from_notice(notice: NetworkNotice) -> Self {
        Self {
            reconnected: notice == NetworkNotice::Reconnected,
            ..Self::default()
        }
    }

    /// A lagged receiver may have skipped a reconnect.
    fn lagged() -> Self {
        Self {
            reconnected: true,
            ..Self::default()
        }
    }

    /// Takes every notice already queued without waiting.
    fn drain(&mut self, notices: &mut broadcast::Receiver<NetworkNotice>) {
        loop {
            match notices.try_recv() {
                Ok(notice) => {
                    self.coalesced += 1;
                    self.reconnected |= notice == NetworkNotice::Reconnected;
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed connectivity notices");
                    self.reconnected = true;
                }
                Err(broadcast::error::TryRecvError::Empty) => return,
                Err(broadcast::error::TryRecvError::Closed) => {
                    self.closed = true;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_event_is_not_a_transition() {
        let monitor = NetworkMonitor::new(Connectivity::Online);
        assert_eq!(monitor.observe(true), None);
        assert_eq!(monitor.current(), Connectivity::Online);
    }

    #[test]
    fn test_transitions_emit_notices() {
        let monitor = NetworkMonitor::new(Connectivity::Online);
        let mut notices = monitor.notices();

        assert_eq!(monitor.observe(false), Some(NetworkNotice::WentOffline));
        assert_eq!(monitor.observe(false), None);
        assert_eq!(monitor.observe(true), Some(NetworkNotice::Reconnected));

        assert_eq!(notices.try_recv().unwrap(), NetworkNotice::WentOffline);
        assert_eq!(notices.try_recv().unwrap(), NetworkNotice::Reconnected);
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_watch_sees_latest_state() {
        let monitor = NetworkMonitor::new(Connectivity::Offline);
        let mut rx = monitor.watch();
        monitor.observe(true);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Connectivity::Online);
    }

    #[test]
    fn test_drain_collapses_queued_flaps() {
        let monitor = NetworkMonitor::new(Connectivity::Online);
        let mut notices = monitor.notices();
        for _ in 0..3 {
            monitor.observe(false);
            monitor.observe(true);
        }

        let mut pending = PendingNotices::from_notice(notices.try_recv().unwrap());
        pending.drain(&mut notices);

        assert!(pending.reconnected);
        assert_eq!(pending.coalesced, 5);
        assert!(!pending.closed);
        assert!(notices.try_recv().is_err());
    }

    #[test]
    fn test_drain_of_offline_only_does_not_reconnect() {
        let monitor = NetworkMonitor::new(Connectivity::Online);
        let mut notices = monitor.notices();
        monitor.observe(false);

        let mut pending = PendingNotices::from_notice(notices.try_recv().unwrap());
        pending.drain(&mut notices);

        assert!(!pending.reconnected);
        assert_eq!(pending.coalesced, 0);
    }

    #[test]
    fn test_connectivity_display() {
        assert_eq!(Connectivity::Online.to_string(), "online");
        assert_eq!(Connectivity::from_online(false), Connectivity::Offline);
    }
}
