//! Fan-in of every supervisor's records into the relayed payload.

mod merge;


use futures::stream::{select_all, BoxStream, SelectAll};
use futures::{FutureExt, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use sysm_types::{AggregatedPayload, BackendId, StatusRecord};
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::relay::RelaySink;
use crate::supervisor::{ConnectionState, StopToken, Subscription};

pub use merge::merge_records;

struct Slot {
    id: String,
    sources: Vec<BackendId>,
}

type Events = SelectAll<BoxStream<'static, StatusRecord>>;

/// Caches the last record of every subscribed backend and relays the merged
/// payload whenever it changes.
pub struct StatusAggregator {
    slots: Vec<Slot>,
    subscriptions: Vec<Subscription>,
    cache: HashMap<BackendId, StatusRecord>,
    last_relayed: Option<AggregatedPayload>,
    resend_interval: Option<Duration>,
}

impl Default for StatusAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            subscriptions: Vec::new(),
            cache: HashMap::new(),
            last_relayed: None,
            resend_interval: None,
        }
    }

    /// Re-relays the current payload at a fixed cadence even when nothing
    /// changed. `None` or zero disables it.
    pub fn with_resend_interval(mut self, interval: Option<Duration>) -> Self {
        self.resend_interval = interval.filter(|d| !d.is_zero());
        self
    }

    /// Adds the payload entry `id`, fed by `subscriptions`. Entries keep
    /// registration order. An entry without subscriptions never appears.
    pub fn register(&mut self, id: impl Into<String>, subscriptions: Vec<Subscription>) {
        if subscriptions.is_empty() {
            return;
        }
        let sources = subscriptions.iter().map(|s| s.backend_id().clone()).collect();
        self.slots.push(Slot {
            id: id.into(),
            sources,
        });
        self.subscriptions.extend(subscriptions);
    }

    pub fn service_ids(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn last_relayed(&self) -> Option<&AggregatedPayload> {
        self.last_relayed.as_ref()
    }

    /// Current merged payload, in registration order. Entries with no
    /// record yet are left out.
    pub fn payload(&self) -> AggregatedPayload {
        let services = self
            .slots
            .iter()
            .filter_map(|slot| {
                let records: Vec<&StatusRecord> =
                    slot.sources.iter().filter_map(|id| self.cache.get(id)).collect();
                merge_records(&slot.id, &records)
            })
            .collect();
        AggregatedPayload { services }
    }

    fn apply(&mut self, record: StatusRecord) -> bool {
        if self.cache.get(record.backend_id()) == Some(&record) {
            return false;
        }
        log_change(&record);
        self.cache.insert(record.backend_id().clone(), record);
        true
    }

    /// Applies every event that is already queued without waiting. Returns
    /// false once all streams have ended.
    fn drain_ready(&mut self, events: &mut Events) -> bool {
        loop {
            match events.next().now_or_never() {
                Some(Some(record)) => {
                    self.apply(record);
                }
                Some(None) => return false,
                None => return true,
            }
        }
    }

    /// Hands the payload to `sink` unless it equals the last one relayed.
    /// `force` skips that check.
    fn relay(&mut self, sink: &dyn RelaySink, force: bool) -> bool {
        let payload = self.payload();
        if payload.is_empty() {
            return false;
        }
        if !force && self.last_relayed.as_ref() == Some(&payload) {
            return false;
        }
        if !sink.relay(&payload) {
            return false;
        }
        debug!(services = payload.len(), forced = force, "status relayed");
        self.last_relayed = Some(payload);
        true
    }

    /// Runs until `stop` fires.
    pub async fn run<R: RelaySink>(
        mut self,
        sink: R,
        mut relay_state: watch::Receiver<ConnectionState>,
        mut stop: StopToken,
    ) {
        let mut events: Events = select_all(self.subscriptions.drain(..).map(|s| s.into_stream().boxed()));
        let mut events_open = !events.is_empty();
        let mut relay_open = true;
        let mut resend = self.resend_interval.map(|every| {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        info!(services = ?self.service_ids(), "aggregator started");

        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                changed = relay_state.changed(), if relay_open => match changed {
                    Ok(()) => {
                        let state = *relay_state.borrow_and_update();
                        if state == ConnectionState::Connected {
                            debug!("relay connected, sending current status");
                            self.relay(&sink, true);
                        }
                    }
                    Err(_) => relay_open = false,
                },
                record = events.next(), if events_open => match record {
                    Some(record) => {
                        self.apply(record);
                        events_open = self.drain_ready(&mut events);
                        self.relay(&sink, false);
                    }
                    None => events_open = false,
                },
                _ = next_tick(&mut resend) => {
                    self.relay(&sink, true);
                }
            }
        }

        debug!("aggregator stopped");
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn log_change(record: &StatusRecord) {
    let backend = record.backend_id();
    if let Some(err) = record.error() {
        error!(%backend, detail = ?err.detail, "{}", err.message);
    }
    if record.is_online() {
        info!(%backend, "online");
    } else {
        warn!(%backend, "offline, {}", record.status_text());
    }
}
