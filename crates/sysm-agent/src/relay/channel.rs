use std::time::Duration;
use sysm_types::{AggregatedPayload, RelayEnvelope};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tracing::{trace, warn};

use super::{OUTBOUND_CAPACITY, RELAY_ID};
use crate::supervisor::{ConnectionState, ConnectionSupervisor, Link, RetryPolicy};

/// Anything the aggregator can hand a payload to.
pub trait RelaySink: Send + Sync {
    /// Returns true if the payload was handed to a live link.
    fn relay(&self, payload: &AggregatedPayload) -> bool;
}

/// Cloneable send side of the relay.
#[derive(Clone)]
pub struct RelaySender {
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::Sender<String>,
}

impl RelaySender {
    pub fn is_connected(&self) -> bool {
        *self.state.borrow() == ConnectionState::Connected
    }

    /// Best effort: a no-op unless the relay is connected. Nothing is
    /// queued for later delivery.
    pub fn send(&self, payload: &AggregatedPayload) -> bool {
        if !self.is_connected() {
            trace!("relay not connected, dropping status");
            return false;
        }

        let envelope = RelayEnvelope::Status {
            payload: payload.clone(),
        };
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to serialize status payload: {}", e);
                return false;
            }
        };

        match self.outbound.try_send(text) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("relay queue full, dropping status");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

impl RelaySink for RelaySender {
    fn relay(&self, payload: &AggregatedPayload) -> bool {
        self.send(payload)
    }
}

/// A supervisor whose link sends rather than watches.
pub struct RelayChannel {
    supervisor: ConnectionSupervisor,
    outbound: mpsc::Sender<String>,
}

impl RelayChannel {
    /// `make_link` receives the queue the link must drain into its socket.
    pub fn new<L, F>(make_link: F, policy: RetryPolicy) -> Self
    where
        L: Link,
        F: FnOnce(mpsc::Receiver<String>) -> L,
    {
        let (outbound, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let supervisor = ConnectionSupervisor::linked(RELAY_ID, make_link(rx), policy);
        Self {
            supervisor,
            outbound,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.supervisor = self.supervisor.enabled(enabled);
        self
    }

    pub fn sender(&self) -> RelaySender {
        RelaySender {
            state: self.supervisor.watch_state(),
            outbound: self.outbound.clone(),
        }
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.watch_state()
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    pub fn start(&mut self) -> bool {
        self.supervisor.start()
    }

    pub async fn shutdown(&mut self, timeout: Duration) {
        self.supervisor.shutdown(timeout).await;
    }
}
