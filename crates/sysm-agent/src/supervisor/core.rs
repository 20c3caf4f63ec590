use std::sync::Arc;
use std::time::Duration;
use sysm_types::{BackendFailure, BackendId, StatusRecord};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{Link, Probe};
use super::cancellation::{stop_pair, StopHandle, StopToken};
use super::reporter::Reporter;
use super::stats::{StatsCounters, SupervisorStats};
use super::subscription::Subscription;
use super::types::{ConnectionState, RetryPolicy};

enum Driver {
    Poll(Box<dyn Probe>),
    Link(Box<dyn Link>),
}

/// Owns the connection lifecycle of a single backend.
///
/// The adapter is moved into a dedicated task on `start()`; from then on the
/// handle only observes (state, records, stats) and can stop the task.
pub struct ConnectionSupervisor {
    id: BackendId,
    enabled: bool,
    policy: RetryPolicy,
    state: Arc<watch::Sender<ConnectionState>>,
    records: Arc<watch::Sender<StatusRecord>>,
    stats: Arc<StatsCounters>,
    stop: StopHandle,
    driver: Option<Driver>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionSupervisor {
    pub fn polling(id: impl Into<BackendId>, probe: impl Probe, policy: RetryPolicy) -> Self {
        let id = id.into();
        let initial = probe.initial_record(&id);
        Self::build(id, Driver::Poll(Box::new(probe)), initial, policy)
    }

    pub fn linked(id: impl Into<BackendId>, link: impl Link, policy: RetryPolicy) -> Self {
        let id = id.into();
        let initial = link.initial_record(&id);
        Self::build(id, Driver::Link(Box::new(link)), initial, policy)
    }

    fn build(id: BackendId, driver: Driver, initial: StatusRecord, policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (records, _) = watch::channel(initial);
        let (stop, _) = stop_pair();

        Self {
            id,
            enabled: true,
            policy,
            state: Arc::new(state),
            records: Arc::new(records),
            stats: Arc::new(StatsCounters::default()),
            stop,
            driver: Some(driver),
            task: None,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn id(&self) -> &BackendId {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn current_record(&self) -> StatusRecord {
        self.records.borrow().clone()
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.id.clone(), self.records.subscribe())
    }

    pub fn stats(&self) -> SupervisorStats {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    fn reporter(&self) -> Reporter {
        Reporter::new(
            self.id.clone(),
            self.state.clone(),
            self.records.clone(),
            self.stats.clone(),
            self.stop.token(),
        )
    }

    /// Launches the driver task. Returns false (and does nothing) when the
    /// backend is disabled, already started or stopped.
    pub fn start(&mut self) -> bool {
        if !self.enabled {
            debug!(backend = %self.id, "backend disabled, not starting");
            return false;
        }
        if self.stop.is_stopped() {
            debug!(backend = %self.id, "supervisor stopped, ignoring start");
            return false;
        }
        let Some(driver) = self.driver.take() else {
            return false;
        };

        let reporter = self.reporter();
        let policy = self.policy;
        let stop = self.stop.token();

        let handle = match driver {
            Driver::Poll(probe) => tokio::spawn(run_poll(probe, reporter, policy, stop)),
            Driver::Link(link) => tokio::spawn(run_link(link, reporter, policy, stop)),
        };
        self.task = Some(handle);

        info!(backend = %self.id, interval = ?policy.interval, "supervisor started");
        true
    }

    /// Moves to `Stopped` and cancels the retry, handshake and heartbeat
    /// timers. Safe to call in any state, any number of times.
    pub fn stop(&mut self) {
        if self.stop.stop() {
            info!(backend = %self.id, "supervisor stopped");
        }
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Stopped {
                false
            } else {
                *state = ConnectionState::Stopped;
                true
            }
        });
    }

    /// Stops and waits up to `timeout` for the driver task to wind down.
    pub async fn shutdown(&mut self, timeout: Duration) {
        self.stop();

        let Some(task) = self.task.take() else {
            return;
        };
        let abort = task.abort_handle();

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(())) => debug!(backend = %self.id, "driver shut down cleanly"),
            Ok(Err(e)) => warn!(backend = %self.id, "driver task failed: {}", e),
            Err(_) => {
                warn!(backend = %self.id, "driver did not stop in time, aborting");
                abort.abort();
            }
        }
    }

    /// Runs a single check (or connect + handshake for session backends)
    /// without starting the supervision loop. Used by `sysm check`.
    pub async fn check_once(&mut self) -> Option<StatusRecord> {
        if !self.enabled || self.task.is_some() {
            return None;
        }

        let reporter = self.reporter();
        let mut stop = self.stop.token();

        match self.driver.as_mut()? {
            Driver::Poll(probe) => {
                if !reporter.transition(ConnectionState::Connecting) {
                    return None;
                }
                poll_once(&mut **probe, &reporter).await;
            }
            Driver::Link(link) => {
                let outcome = open_link(&mut **link, &reporter, &mut stop).await;
                link.close().await;
                if let Attempt::Failed(failure) = outcome {
                    reporter.report_failure(link.failure_record(&self.id, &failure));
                }
            }
        }

        Some(self.current_record())
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

async fn poll_once(probe: &mut dyn Probe, reporter: &Reporter) {
    let id = reporter.id().clone();
    match probe.probe().await {
        Ok(report) => {
            reporter.report_success(report.into_record(&id));
        }
        Err(failure) => {
            debug!(backend = %id, %failure, "check failed");
            reporter.report_failure(probe.failure_record(&id, &failure));
        }
    }
}

async fn run_poll(
    mut probe: Box<dyn Probe>,
    reporter: Reporter,
    policy: RetryPolicy,
    mut stop: StopToken,
) {
    loop {
        // a healthy poller stays Connected between checks
        if reporter.state() != ConnectionState::Connected
            && !reporter.transition(ConnectionState::Connecting)
        {
            break;
        }

        tokio::select! {
            biased;
            _ = stop.stopped() => break,
            _ = poll_once(&mut *probe, &reporter) => {}
        }

        if !stop.sleep(policy.interval).await {
            break;
        }
    }

    debug!(backend = %reporter.id(), "poll loop ended");
}

enum Attempt {
    Connected,
    Failed(BackendFailure),
    Stopped,
}

async fn open_link(link: &mut dyn Link, reporter: &Reporter, stop: &mut StopToken) -> Attempt {
    if !reporter.transition(ConnectionState::Connecting) {
        return Attempt::Stopped;
    }

    let connected = tokio::select! {
        biased;
        _ = stop.stopped() => return Attempt::Stopped,
        result = link.connect() => result,
    };
    if let Err(failure) = connected {
        return Attempt::Failed(failure);
    }

    if link.requires_handshake() {
        if !reporter.transition(ConnectionState::Authenticating) {
            return Attempt::Stopped;
        }
        let authenticated = tokio::select! {
            biased;
            _ = stop.stopped() => return Attempt::Stopped,
            result = link.authenticate() => result,
        };
        if let Err(failure) = authenticated {
            return Attempt::Failed(failure);
        }
    }

    reporter.report_success(link.connected_record(reporter.id()));
    if stop.is_stopped() {
        return Attempt::Stopped;
    }
    Attempt::Connected
}

/// Publishes the failure and decides whether the retry cycle continues.
fn settle_failure(
    link: &dyn Link,
    reporter: &Reporter,
    policy: &RetryPolicy,
    failure: &BackendFailure,
) -> bool {
    reporter.report_failure(link.failure_record(reporter.id(), failure));

    if failure.is_authentication() && !policy.retry_on_auth_failure {
        warn!(
            backend = %reporter.id(),
            "authentication rejected ({}), not retrying",
            failure.message()
        );
        return false;
    }

    debug!(
        backend = %reporter.id(),
        %failure,
        "not connected, retrying in {:?}",
        policy.interval
    );
    true
}

async fn run_link(
    mut link: Box<dyn Link>,
    reporter: Reporter,
    policy: RetryPolicy,
    mut stop: StopToken,
) {
    loop {
        let failure = match open_link(&mut *link, &reporter, &mut stop).await {
            Attempt::Stopped => {
                link.close().await;
                break;
            }
            Attempt::Failed(failure) => failure,
            Attempt::Connected => {
                info!(backend = %reporter.id(), "connected");
                tokio::select! {
                    biased;
                    _ = stop.stopped() => {
                        link.close().await;
                        break;
                    }
                    failure = link.serve() => failure,
                }
            }
        };

        link.close().await;
        if !settle_failure(&*link, &reporter, &policy, &failure) {
            break;
        }

        if !stop.sleep(policy.interval).await {
            break;
        }
    }

    debug!(backend = %reporter.id(), "link loop ended");
}
