use std::sync::Arc;
use sysm_types::{BackendId, StatusRecord};
use tokio::sync::watch;
use tracing::{debug, trace};

use super::cancellation::StopToken;
use super::stats::StatsCounters;
use super::types::ConnectionState;

/// Write side of a supervisor, owned by its driver task.
///
/// Every state transition and record publication goes through here so the
/// stop check and change detection live in one place.
pub(crate) struct Reporter {
    id: BackendId,
    state: Arc<watch::Sender<ConnectionState>>,
    records: Arc<watch::Sender<StatusRecord>>,
    stats: Arc<StatsCounters>,
    stop: StopToken,
}

impl Reporter {
    pub(crate) fn new(
        id: BackendId,
        state: Arc<watch::Sender<ConnectionState>>,
        records: Arc<watch::Sender<StatusRecord>>,
        stats: Arc<StatsCounters>,
        stop: StopToken,
    ) -> Self {
        Self {
            id,
            state,
            records,
            stats,
            stop,
        }
    }

    pub(crate) fn id(&self) -> &BackendId {
        &self.id
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Moves to `next`. Refused once stopped: `Stopped` is terminal.
    pub(crate) fn transition(&self, next: ConnectionState) -> bool {
        if self.stop.is_stopped() {
            return false;
        }

        let moved = self.state.send_if_modified(|current| {
            if *current == ConnectionState::Stopped || *current == next {
                false
            } else {
                trace!(backend = %self.id, from = %current, to = %next, "state transition");
                *current = next;
                true
            }
        });

        if moved && next == ConnectionState::Connecting {
            self.stats.record_attempt();
        }
        moved || self.state() == next
    }

    pub(crate) fn report_success(&self, record: StatusRecord) -> bool {
        if !self.transition(ConnectionState::Connected) {
            return false;
        }
        self.stats.record_connection();
        self.publish(record)
    }

    pub(crate) fn report_failure(&self, record: StatusRecord) -> bool {
        if !self.transition(ConnectionState::Disconnected) {
            return false;
        }
        self.stats.record_failure();
        self.publish(record)
    }

    /// Stores `record` and notifies subscribers iff it differs from the last
    /// published one.
    pub(crate) fn publish(&self, record: StatusRecord) -> bool {
        if self.stop.is_stopped() {
            return false;
        }

        let changed = self.records.send_if_modified(|current| {
            if *current == record {
                false
            } else {
                *current = record;
                true
            }
        });

        if changed {
            self.stats.record_emission();
            let current = self.records.borrow();
            debug!(
                backend = %self.id,
                online = current.is_online(),
                status = %current.status_text(),
                "status changed"
            );
        }
        changed
    }
}
