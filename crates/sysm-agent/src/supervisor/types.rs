use serde::Serialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Authenticating,
    Connected,
    Disconnected,
    Stopped,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Authenticating => write!(f, "authenticating"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Fixed-interval retry, no backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub retry_on_auth_failure: bool,
}

impl RetryPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            retry_on_auth_failure: true,
        }
    }

    pub fn with_auth_retry(mut self, enabled: bool) -> Self {
        self.retry_on_auth_failure = enabled;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS))
    }
}
