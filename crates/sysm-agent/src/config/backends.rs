use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::constants::*;
use super::types::{scheme, trim_host};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Send `username`/`password` with the CONNECT packet.
    pub auth: bool,
    pub username: String,
    pub password: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".into(),
            port: DEFAULT_MQTT_PORT,
            auth: true,
            username: String::new(),
            password: String::new(),
        }
    }
}

/// The home-automation hub, watched over HTTP and WebSocket at once.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub enabled: bool,
    pub host: String,
    pub tls: bool,
    pub interval_ms: u64,
    pub token: Option<String>,
    pub retry_on_auth_failure: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "supervisor".into(),
            tls: false,
            interval_ms: DEFAULT_HUB_INTERVAL_MS,
            token: None,
            retry_on_auth_failure: true,
        }
    }
}

impl HubConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn has_token(&self) -> bool {
        self.token.as_deref().map(|t| !t.is_empty()).unwrap_or(false)
    }

    /// Without a configured token the hub is reached through the supervisor
    /// proxy, which lives under `/core`.
    fn path_prefix(&self) -> &'static str {
        if self.has_token() {
            ""
        } else {
            "/core"
        }
    }

    /// Configured token, else the one the supervisor injects into add-ons.
    pub fn resolve_token(&self) -> String {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(SUPERVISOR_TOKEN_ENV).ok())
            .unwrap_or_default()
    }

    pub fn rest_url(&self) -> String {
        format!(
            "{}://{}{}/api/",
            scheme(self.tls, "https", "http"),
            trim_host(&self.host),
            self.path_prefix()
        )
    }

    pub fn ws_url(&self) -> String {
        let path = if self.has_token() {
            "/api/websocket"
        } else {
            "/core/websocket"
        };
        format!("{}://{}{}", scheme(self.tls, "wss", "ws"), trim_host(&self.host), path)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub enabled: bool,
    pub socket: PathBuf,
    /// Watched container names; a container matches when any of its names
    /// contains one of these.
    pub containers: Vec<String>,
    pub interval_ms: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            socket: PathBuf::from(DEFAULT_DOCKER_SOCKET),
            containers: Vec::new(),
            interval_ms: DEFAULT_DOCKER_INTERVAL_MS,
        }
    }
}

impl DockerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
