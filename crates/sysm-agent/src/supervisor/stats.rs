use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub(crate) struct StatsCounters {
    attempts: AtomicU64,
    connections: AtomicU64,
    failures: AtomicU64,
    emissions: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_emission(&self) {
        self.emissions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SupervisorStats {
        SupervisorStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            emissions: self.emissions.load(Ordering::Relaxed),
        }
    }
}

/// Lifetime counters of one supervisor. `attempts` counts transitions into
/// `Connecting`, `emissions` counts published record changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SupervisorStats {
    pub attempts: u64,
    pub connections: u64,
    pub failures: u64,
    pub emissions: u64,
}
