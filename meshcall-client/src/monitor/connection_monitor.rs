use meshcall_core::{Identity, SessionId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    GraceExpired { remote: Identity, session: SessionId },
    OfferTimedOut { remote: Identity, session: SessionId },
}

/// Per-session timers: the disconnect grace period and the optional offer
/// timeout. Each timer is a spawned sleep that reports through `timer_tx`.
///
/// A timer counts only while its handle is still registered; an expiry that
/// was already queued when the timer got cancelled is rejected by `take_*`.
pub struct ConnectionMonitor {
    grace_period: Duration,
    offer_timeout: Option<Duration>,
    grace_timers: HashMap<SessionId, JoinHandle<()>>,
    offer_timers: HashMap<SessionId, JoinHandle<()>>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
}

impl ConnectionMonitor {
    pub fn new(
        grace_period: Duration,
        offer_timeout: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let monitor = Self {
            grace_period,
            offer_timeout,
            grace_timers: HashMap::new(),
            offer_timers: HashMap::new(),
            timer_tx,
        };
        (monitor, timer_rx)
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Arms the grace timer unless it is already running.
    pub fn on_disconnected(&mut self, remote: &Identity, session: SessionId) {
        if self.grace_timers.contains_key(&session) {
            return;
        }
        debug!("Grace period started for {} ({:?})", remote, self.grace_period);
        let event = TimerEvent::GraceExpired {
            remote: remote.clone(),
            session,
        };
        let handle = self.spawn_timer(self.grace_period, event);
        self.grace_timers.insert(session, handle);
    }

    pub fn on_connected(&mut self, session: SessionId) {
        if let Some(handle) = self.grace_timers.remove(&session) {
            handle.abort();
            debug!("Session {} recovered within the grace period", session);
        }
    }

    pub fn is_grace_pending(&self, session: SessionId) -> bool {
        self.grace_timers.contains_key(&session)
    }

    /// True if the grace timer for `session` is still live; consumes it.
    pub fn take_grace_expired(&mut self, session: SessionId) -> bool {
        self.grace_timers.remove(&session).is_some()
    }

    pub fn arm_offer_timeout(&mut self, remote: &Identity, session: SessionId) {
        let Some(timeout) = self.offer_timeout else {
            return;
        };
        let event = TimerEvent::OfferTimedOut {
            remote: remote.clone(),
            session,
        };
        let handle = self.spawn_timer(timeout, event);
        if let Some(old) = self.offer_timers.insert(session, handle) {
            old.abort();
        }
    }

    pub fn cancel_offer_timeout(&mut self, session: SessionId) {
        if let Some(handle) = self.offer_timers.remove(&session) {
            handle.abort();
        }
    }

    pub fn take_offer_timed_out(&mut self, session: SessionId) -> bool {
        self.offer_timers.remove(&session).is_some()
    }

    pub fn cancel(&mut self, session: SessionId) {
        self.on_connected(session);
        self.cancel_offer_timeout(session);
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.grace_timers.drain().chain(self.offer_timers.drain()) {
            handle.abort();
        }
    }

    pub fn active_timers(&self) -> usize {
        self.grace_timers.len() + self.offer_timers.len()
    }

    fn spawn_timer(&self, after: Duration, event: TimerEvent) -> JoinHandle<()> {
        let tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(event);
        })
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
