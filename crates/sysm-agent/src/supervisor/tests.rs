use super::reporter::Reporter;
use super::stats::StatsCounters;
use super::*;
use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysm_types::{BackendFailure, BackendId, StatusRecord};
use tokio::sync::watch;

const INTERVAL: Duration = Duration::from_millis(1000);

struct ScriptedProbe {
    calls: Arc<AtomicUsize>,
    script: Vec<Result<ProbeReport, BackendFailure>>,
}

impl ScriptedProbe {
    fn new(script: Vec<Result<ProbeReport, BackendFailure>>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: calls.clone(),
                script,
            },
            calls,
        )
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&mut self) -> Result<ProbeReport, BackendFailure> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.script[n.min(self.script.len() - 1)].clone()
    }

    fn describe(&self, failure: &BackendFailure) -> String {
        format!("Not connected to server, {}", failure.code().unwrap_or("unknown reason"))
    }
}

fn refused() -> BackendFailure {
    BackendFailure::transport("connect error").with_code("ECONNREFUSED")
}

#[derive(Default)]
struct LinkCounters {
    connects: AtomicUsize,
    closes: AtomicUsize,
    serves: AtomicUsize,
}

struct FakeLink {
    counters: Arc<LinkCounters>,
    connect_results: Vec<Result<(), BackendFailure>>,
    auth_results: Option<Vec<Result<(), BackendFailure>>>,
    serve_failures: Vec<(Duration, BackendFailure)>,
    connect_hangs: bool,
}

impl FakeLink {
    fn healthy() -> (Self, Arc<LinkCounters>) {
        let counters = Arc::new(LinkCounters::default());
        (
            Self {
                counters: counters.clone(),
                connect_results: vec![Ok(())],
                auth_results: None,
                serve_failures: Vec::new(),
                connect_hangs: false,
            },
            counters,
        )
    }
}

fn pick<T: Clone>(items: &[T], n: usize) -> T {
    items[n.min(items.len() - 1)].clone()
}

#[async_trait]
impl Link for FakeLink {
    async fn connect(&mut self) -> Result<(), BackendFailure> {
        let n = self.counters.connects.fetch_add(1, Ordering::SeqCst);
        if self.connect_hangs {
            std::future::pending::<()>().await;
        }
        pick(&self.connect_results, n)
    }

    fn requires_handshake(&self) -> bool {
        self.auth_results.is_some()
    }

    async fn authenticate(&mut self) -> Result<(), BackendFailure> {
        let n = self.counters.connects.load(Ordering::SeqCst) - 1;
        match &self.auth_results {
            Some(results) => pick(results, n),
            None => Ok(()),
        }
    }

    async fn serve(&mut self) -> BackendFailure {
        let n = self.counters.serves.fetch_add(1, Ordering::SeqCst);
        match self.serve_failures.get(n) {
            Some((after, failure)) => {
                tokio::time::sleep(*after).await;
                failure.clone()
            }
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn describe(&self, failure: &BackendFailure) -> String {
        if failure.is_authentication() {
            "Failed to authenticate with server".to_string()
        } else if failure.code() == Some("PING_TIMEOUT") {
            "Server not responding to ping".to_string()
        } else {
            "Not connected".to_string()
        }
    }
}

async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_success_emits_once() {
    let (probe, calls) = ScriptedProbe::new(vec![Ok(ProbeReport::online("API running."))]);
    let mut supervisor = ConnectionSupervisor::polling("hub-http", probe, RetryPolicy::fixed(INTERVAL));
    let mut subscription = supervisor.subscribe();

    assert_eq!(supervisor.state(), ConnectionState::Idle);
    assert!(supervisor.start());
    advance(Duration::from_millis(4500)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(supervisor.state(), ConnectionState::Connected);

    let stats = supervisor.stats();
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.connections, 5);
    assert_eq!(stats.emissions, 1);

    let record = subscription.next().await.unwrap();
    assert!(record.is_online());
    assert_eq!(record.status_text(), "API running.");
    assert!(!subscription.has_pending());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_identical_failures_emit_once() {
    let (probe, calls) = ScriptedProbe::new(vec![Err(refused())]);
    let mut supervisor = ConnectionSupervisor::polling("hub-http", probe, RetryPolicy::fixed(INTERVAL));
    let mut subscription = supervisor.subscribe();
    let initial = subscription.next().await.unwrap();
    assert_eq!(initial, StatusRecord::not_connected(BackendId::new("hub-http")));

    supervisor.start();
    advance(Duration::from_millis(4500)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    let stats = supervisor.stats();
    assert_eq!(stats.failures, 5);
    assert_eq!(stats.attempts, 5);
    assert_eq!(stats.emissions, 1);
    assert_eq!(supervisor.state(), ConnectionState::Disconnected);

    let record = subscription.next().await.unwrap();
    assert!(!record.is_online());
    assert_eq!(record.status_text(), "Not connected to server, ECONNREFUSED");
    assert_eq!(record.error().unwrap().message, "connect error");
    assert!(!subscription.has_pending());
}

#[tokio::test(start_paused = true)]
async fn test_each_distinct_change_is_emitted() {
    let (probe, _calls) = ScriptedProbe::new(vec![
        Ok(ProbeReport::online("API running.")),
        Err(refused()),
        Err(refused()),
        Ok(ProbeReport::online("API running.")),
    ]);
    let mut supervisor = ConnectionSupervisor::polling("hub-http", probe, RetryPolicy::fixed(INTERVAL));
    supervisor.start();
    advance(Duration::from_millis(5500)).await;

    assert_eq!(supervisor.stats().emissions, 3);
    assert!(supervisor.current_record().is_online());
}

#[tokio::test(start_paused = true)]
async fn test_stop_suppresses_pending_retries() {
    let (probe, calls) = ScriptedProbe::new(vec![Err(refused())]);
    let mut supervisor = ConnectionSupervisor::polling("docker", probe, RetryPolicy::fixed(INTERVAL));
    supervisor.start();
    advance(Duration::from_millis(1500)).await;

    supervisor.stop();
    let before = supervisor.stats();
    assert_eq!(before.attempts, 2);

    advance(INTERVAL * 10).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(supervisor.stats(), before);
    assert_eq!(supervisor.state(), ConnectionState::Stopped);
    assert!(!supervisor.is_running());

    supervisor.stop();
    assert!(!supervisor.start());
    assert_eq!(supervisor.state(), ConnectionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_noop() {
    let (probe, calls) = ScriptedProbe::new(vec![Ok(ProbeReport::online("ok"))]);
    let mut supervisor = ConnectionSupervisor::polling("docker", probe, RetryPolicy::fixed(INTERVAL));
    assert!(supervisor.start());
    assert!(!supervisor.start());
    advance(Duration::from_millis(500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_backend_never_connects() {
    let (probe, calls) = ScriptedProbe::new(vec![Ok(ProbeReport::online("ok"))]);
    let mut supervisor =
        ConnectionSupervisor::polling("docker", probe, RetryPolicy::fixed(INTERVAL)).enabled(false);

    assert!(!supervisor.start());
    assert!(supervisor.check_once().await.is_none());
    advance(INTERVAL * 5).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(supervisor.state(), ConnectionState::Idle);
    assert_eq!(supervisor.stats(), SupervisorStats::default());
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_start() {
    let (probe, calls) = ScriptedProbe::new(vec![Ok(ProbeReport::online("ok"))]);
    let mut supervisor = ConnectionSupervisor::polling("docker", probe, RetryPolicy::fixed(INTERVAL));
    supervisor.stop();
    assert!(!supervisor.start());
    advance(INTERVAL * 2).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(supervisor.state(), ConnectionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_check_once_reports_without_looping() {
    let (probe, calls) = ScriptedProbe::new(vec![Err(refused())]);
    let mut supervisor = ConnectionSupervisor::polling("hub-http", probe, RetryPolicy::fixed(INTERVAL));

    let record = supervisor.check_once().await.unwrap();
    assert!(!record.is_online());
    assert_eq!(record.status_text(), "Not connected to server, ECONNREFUSED");

    advance(INTERVAL * 3).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(supervisor.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_link_connects_and_reports() {
    let (link, counters) = FakeLink::healthy();
    let mut supervisor = ConnectionSupervisor::linked("mqtt", link, RetryPolicy::fixed(INTERVAL));
    supervisor.start();
    advance(Duration::from_millis(100)).await;

    assert_eq!(supervisor.state(), ConnectionState::Connected);
    let record = supervisor.current_record();
    assert!(record.is_online());
    assert_eq!(record.status_text(), "Connected");
    assert!(record.error().is_none());
    assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_liveness_failure_disconnects_once_and_retries() {
    let (mut link, counters) = FakeLink::healthy();
    link.serve_failures = vec![(
        Duration::from_millis(6500),
        BackendFailure::liveness("no pong").with_code("PING_TIMEOUT"),
    )];
    let mut supervisor = ConnectionSupervisor::linked("hub-ws", link, RetryPolicy::fixed(INTERVAL));
    let mut states = supervisor.watch_state();
    supervisor.start();

    advance(Duration::from_millis(7000)).await;
    assert_eq!(supervisor.state(), ConnectionState::Disconnected);
    assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);
    let stats = supervisor.stats();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.attempts, 1);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    assert_eq!(
        supervisor.current_record().status_text(),
        "Server not responding to ping"
    );

    advance(Duration::from_millis(1000)).await;
    let stats = supervisor.stats();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.attempts, 2);
    assert_eq!(supervisor.state(), ConnectionState::Connected);
    assert_eq!(counters.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_auth_rejection_without_retry_ends_cycle() {
    let (mut link, counters) = FakeLink::healthy();
    link.auth_results = Some(vec![Err(BackendFailure::authentication("invalid token"))]);
    let policy = RetryPolicy::fixed(INTERVAL).with_auth_retry(false);
    let mut supervisor = ConnectionSupervisor::linked("relay", link, policy);
    supervisor.start();

    advance(INTERVAL * 10).await;

    assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
    assert_eq!(supervisor.state(), ConnectionState::Disconnected);
    assert!(!supervisor.is_running());
    let record = supervisor.current_record();
    assert_eq!(record.status_text(), "Failed to authenticate with server");
    assert_eq!(record.error().unwrap().message, "invalid token");
}

#[tokio::test(start_paused = true)]
async fn test_auth_rejection_with_retry_keeps_cycling() {
    let (mut link, counters) = FakeLink::healthy();
    link.auth_results = Some(vec![
        Err(BackendFailure::authentication("invalid token")),
        Err(BackendFailure::authentication("invalid token")),
        Ok(()),
    ]);
    let mut supervisor =
        ConnectionSupervisor::linked("hub-ws", link, RetryPolicy::fixed(INTERVAL).with_auth_retry(true));
    supervisor.start();

    advance(Duration::from_millis(2500)).await;

    assert_eq!(counters.connects.load(Ordering::SeqCst), 3);
    assert_eq!(supervisor.state(), ConnectionState::Connected);
    assert_eq!(supervisor.stats().emissions, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_hanging_connect() {
    let (mut link, counters) = FakeLink::healthy();
    link.connect_hangs = true;
    let mut supervisor = ConnectionSupervisor::linked("relay", link, RetryPolicy::fixed(INTERVAL));
    supervisor.start();
    advance(Duration::from_millis(100)).await;
    assert_eq!(supervisor.state(), ConnectionState::Connecting);

    supervisor.shutdown(Duration::from_secs(1)).await;

    assert_eq!(supervisor.state(), ConnectionState::Stopped);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    advance(INTERVAL * 5).await;
    assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_backend_does_not_delay_others() {
    let (mut hanging, _) = FakeLink::healthy();
    hanging.connect_hangs = true;
    let mut slow = ConnectionSupervisor::linked("relay", hanging, RetryPolicy::fixed(INTERVAL));

    let (probe, calls) = ScriptedProbe::new(vec![Err(refused())]);
    let mut poller = ConnectionSupervisor::polling("docker", probe, RetryPolicy::fixed(INTERVAL));

    slow.start();
    poller.start();
    advance(Duration::from_millis(3500)).await;

    assert_eq!(slow.state(), ConnectionState::Connecting);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

fn test_reporter() -> (Reporter, watch::Receiver<StatusRecord>, StopHandle) {
    let id = BackendId::new("mqtt");
    let (state, _) = watch::channel(ConnectionState::Idle);
    let (records, rx) = watch::channel(StatusRecord::not_connected(id.clone()));
    let (stop, token) = stop_pair();
    let reporter = Reporter::new(
        id,
        Arc::new(state),
        Arc::new(records),
        Arc::new(StatsCounters::default()),
        token,
    );
    (reporter, rx, stop)
}

fn sample_record(n: u8) -> StatusRecord {
    let id = BackendId::new("mqtt");
    match n {
        0 => StatusRecord::online(id, "Connected"),
        1 => StatusRecord::offline(id, "Unable to connect to host, ECONNREFUSED", None),
        2 => StatusRecord::offline(
            id,
            "Unable to connect to host, ECONNREFUSED",
            Some(refused().to_status_error()),
        ),
        _ => StatusRecord::not_connected(id),
    }
}

#[test]
fn test_reporter_ignores_everything_after_stop() {
    let (reporter, mut rx, stop) = test_reporter();
    let _ = rx.borrow_and_update();
    stop.stop();

    assert!(!reporter.transition(ConnectionState::Connecting));
    assert!(!reporter.report_success(sample_record(0)));
    assert!(!rx.has_changed().unwrap());
    assert_eq!(reporter.state(), ConnectionState::Idle);
}

proptest! {
    #[test]
    fn prop_emits_iff_record_changed(sequence in proptest::collection::vec(0u8..4, 1..40)) {
        let (reporter, mut rx, _stop) = test_reporter();
        let mut last = rx.borrow_and_update().clone();

        for n in sequence {
            let record = sample_record(n);
            let expected = record != last;
            let emitted = reporter.publish(record.clone());

            prop_assert_eq!(emitted, expected);
            prop_assert_eq!(rx.has_changed().unwrap(), expected);
            if expected {
                prop_assert_eq!(&*rx.borrow_and_update(), &record);
            }
            last = record;
        }
    }
}
