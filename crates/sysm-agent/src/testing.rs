//! Fakes shared by the unit tests of several modules.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysm_types::{AggregatedPayload, BackendFailure};
use tokio::sync::mpsc;

use crate::relay::RelaySink;
use crate::supervisor::{Link, Probe, ProbeReport};

/// Probe that returns the same outcome on every poll.
pub struct FixedProbe(pub Result<ProbeReport, BackendFailure>);

#[async_trait]
impl Probe for FixedProbe {
    async fn probe(&mut self) -> Result<ProbeReport, BackendFailure> {
        self.0.clone()
    }

    fn describe(&self, failure: &BackendFailure) -> String {
        format!("Not connected to server, {}", failure.code().unwrap_or("unknown reason"))
    }
}

/// Link that connects (or fails) immediately and then stays up forever.
pub struct SteadyLink(pub Result<(), BackendFailure>);

#[async_trait]
impl Link for SteadyLink {
    async fn connect(&mut self) -> Result<(), BackendFailure> {
        self.0.clone()
    }

    async fn serve(&mut self) -> BackendFailure {
        std::future::pending().await
    }

    async fn close(&mut self) {}

    fn describe(&self, _failure: &BackendFailure) -> String {
        "Not connected".to_string()
    }
}

/// Relay link that hands every outbound message to `delivered`, optionally
/// dropping the session once after `drop_after`.
pub struct ForwardingLink {
    pub outbound: mpsc::Receiver<String>,
    pub delivered: mpsc::UnboundedSender<String>,
    pub drop_after: Option<Duration>,
}

#[async_trait]
impl Link for ForwardingLink {
    async fn connect(&mut self) -> Result<(), BackendFailure> {
        Ok(())
    }

    async fn serve(&mut self) -> BackendFailure {
        let lifetime = self.drop_after.take().unwrap_or(Duration::from_secs(3600));
        let deadline = tokio::time::sleep(lifetime);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => return BackendFailure::transport("dropped").with_code("ECONNRESET"),
                Some(text) = self.outbound.recv() => {
                    let _ = self.delivered.send(text);
                }
            }
        }
    }

    async fn close(&mut self) {}

    fn describe(&self, _failure: &BackendFailure) -> String {
        "Not connected".into()
    }
}

pub fn refused() -> BackendFailure {
    BackendFailure::transport("connect ECONNREFUSED").with_code("ECONNREFUSED")
}

/// Sink that records every payload it accepts.
#[derive(Clone)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<AggregatedPayload>>>,
    connected: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new(connected: bool) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(connected)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<AggregatedPayload> {
        self.sent.lock().unwrap().clone()
    }
}

impl RelaySink for RecordingSink {
    fn relay(&self, payload: &AggregatedPayload) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().unwrap().push(payload.clone());
        true
    }
}
