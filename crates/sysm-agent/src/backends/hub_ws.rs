use async_trait::async_trait;
use sysm_types::BackendFailure;

use crate::config::HubConfig;
use crate::handshake::{describe_session_failure, Credentials, HandshakeConfig, TokenField, WsSession};
use crate::supervisor::Link;

/// The hub's WebSocket API: authenticated with `access_token`, kept alive
/// with pings.
pub struct HubWsLink {
    session: WsSession,
}

impl HubWsLink {
    pub fn new(config: &HubConfig) -> Self {
        Self::with_session(WsSession::new(
            config.ws_url(),
            Credentials::new(config.resolve_token(), TokenField::SnakeCase),
            HandshakeConfig::default(),
        ))
    }

    pub fn with_session(session: WsSession) -> Self {
        Self { session }
    }

    pub fn url(&self) -> &str {
        self.session.url()
    }
}

#[async_trait]
impl Link for HubWsLink {
    async fn connect(&mut self) -> Result<(), BackendFailure> {
        self.session.connect().await
    }

    fn requires_handshake(&self) -> bool {
        true
    }

    async fn authenticate(&mut self) -> Result<(), BackendFailure> {
        self.session.authenticate().await
    }

    async fn serve(&mut self) -> BackendFailure {
        self.session.serve(None).await
    }

    async fn close(&mut self) {
        self.session.close().await;
    }

    fn describe(&self, failure: &BackendFailure) -> String {
        describe_session_failure(failure)
    }
}
