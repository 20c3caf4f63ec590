use async_trait::async_trait;
use sysm_types::BackendFailure;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::RelayConfig;
use crate::handshake::{describe_session_failure, Credentials, HandshakeConfig, TokenField, WsSession};
use crate::supervisor::Link;

pub struct RelayLink {
    session: WsSession,
    outbound: mpsc::Receiver<String>,
}

impl RelayLink {
    pub fn new(session: WsSession, outbound: mpsc::Receiver<String>) -> Self {
        Self { session, outbound }
    }

    pub fn from_config(config: &RelayConfig, outbound: mpsc::Receiver<String>) -> Self {
        let credentials = Credentials::new(config.token.clone().unwrap_or_default(), TokenField::CamelCase)
            .with_app_id(config.app_id.clone());
        let session = WsSession::new(config.url(), credentials, HandshakeConfig::default());
        Self::new(session, outbound)
    }

    /// Drops whatever was queued for a previous session.
    fn discard_stale(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "discarded stale status messages");
        }
    }
}

#[async_trait]
impl Link for RelayLink {
    async fn connect(&mut self) -> Result<(), BackendFailure> {
        self.discard_stale();
        self.session.connect().await
    }

    fn requires_handshake(&self) -> bool {
        true
    }

    async fn authenticate(&mut self) -> Result<(), BackendFailure> {
        self.session.authenticate().await
    }

    async fn serve(&mut self) -> BackendFailure {
        self.session.serve(Some(&mut self.outbound)).await
    }

    async fn close(&mut self) {
        self.session.close().await;
    }

    fn describe(&self, failure: &BackendFailure) -> String {
        describe_session_failure(failure)
    }
}
