//! Authentication challenge/response and ping/pong liveness for the
//! WebSocket backends (hub and relay).

mod auth;
mod heartbeat;
mod session;


use std::time::Duration;
use sysm_types::BackendFailure;
use tokio_tungstenite::tungstenite::Error as WsError;

pub use auth::{authenticate, Credentials, TokenField};
pub use heartbeat::{serve, Heartbeat};
pub use session::{HandshakeConfig, WsSession, WsStream};

pub const AUTH_TIMEOUT: Duration = Duration::from_millis(3000);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(5000);
pub const PONG_TIMEOUT: Duration = Duration::from_millis(1500);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure code of a handshake that got no answer in time.
pub const CODE_AUTH_TIMEOUT: &str = "AUTH_TIMEOUT";
/// Failure code of a ping that got no pong in time.
pub const CODE_PING_TIMEOUT: &str = "PING_TIMEOUT";

pub(crate) fn ws_failure(err: &WsError) -> BackendFailure {
    match err {
        WsError::Io(io_err) => BackendFailure::from_io(io_err),
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            BackendFailure::transport(err.to_string()).with_code("ECONNRESET")
        }
        WsError::Http(response) => {
            let status = response.status();
            let failure = if status.as_u16() == 401 || status.as_u16() == 403 {
                BackendFailure::authentication(err.to_string())
            } else {
                BackendFailure::transport(err.to_string())
            };
            failure.with_code(status.as_u16().to_string())
        }
        other => BackendFailure::from_error_chain(other),
    }
}

/// Status text for a failed WebSocket session, shared by the hub and relay
/// links.
pub fn describe_session_failure(failure: &BackendFailure) -> String {
    if failure.is_authentication() {
        return "Failed to authenticate with server".to_string();
    }
    match failure.code() {
        Some(CODE_AUTH_TIMEOUT) => "Server never responded to auth request".to_string(),
        Some(CODE_PING_TIMEOUT) => "Server not responding to ping".to_string(),
        _ => sysm_types::STATUS_NOT_CONNECTED.to_string(),
    }
}
