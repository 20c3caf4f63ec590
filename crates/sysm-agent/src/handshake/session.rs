use std::time::Duration;
use sysm_types::BackendFailure;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::auth::{authenticate, Credentials};
use super::heartbeat::{serve, Heartbeat};
use super::{ws_failure, AUTH_TIMEOUT, CONNECT_TIMEOUT};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub connect_timeout: Duration,
    pub auth_timeout: Duration,
    pub heartbeat: Heartbeat,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            auth_timeout: AUTH_TIMEOUT,
            heartbeat: Heartbeat::default(),
        }
    }
}

/// One authenticated WebSocket connection, reopened from scratch on every
/// `connect()`.
pub struct WsSession {
    url: String,
    credentials: Credentials,
    config: HandshakeConfig,
    socket: Option<WsStream>,
}

impl WsSession {
    pub fn new(url: impl Into<String>, credentials: Credentials, config: HandshakeConfig) -> Self {
        Self {
            url: url.into(),
            credentials,
            config,
            socket: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    pub async fn connect(&mut self) -> Result<(), BackendFailure> {
        self.close().await;

        debug!(url = %self.url, "opening websocket");
        let connecting = tokio::time::timeout(self.config.connect_timeout, connect_async(self.url.as_str()));
        let (socket, _response) = match connecting.await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => return Err(ws_failure(&e)),
            Err(_) => {
                return Err(BackendFailure::transport("websocket connect timed out").with_code("ETIMEDOUT"))
            }
        };

        self.socket = Some(socket);
        Ok(())
    }

    pub async fn authenticate(&mut self) -> Result<(), BackendFailure> {
        let socket = self.socket.as_mut().ok_or_else(not_open)?;
        authenticate(socket, &self.credentials, self.config.auth_timeout).await
    }

    pub async fn serve(&mut self, outbound: Option<&mut mpsc::Receiver<String>>) -> BackendFailure {
        match self.socket.as_mut() {
            Some(socket) => serve(socket, self.config.heartbeat, outbound).await,
            None => not_open(),
        }
    }

    /// Drops the socket after a bounded attempt at a clean close.
    pub async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Ok(Err(e)) = tokio::time::timeout(CLOSE_TIMEOUT, socket.close(None)).await {
                trace!(url = %self.url, "close handshake failed: {}", e);
            }
        }
    }
}

fn not_open() -> BackendFailure {
    BackendFailure::transport("websocket not open").with_code("ENOTCONN")
}
