use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysm_types::{SysmError, SysmResult};
use tracing::{info, warn};

use super::backends::{DockerConfig, HubConfig, MqttConfig};
use super::constants::DEFAULT_INTERVAL_MS;
use super::logging::LoggingConfig;
use super::relay::RelayConfig;
use super::types::{parse_bool, LogLevel};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Retry interval of backends without one of their own (mqtt).
    pub interval_ms: u64,
    pub logging: LoggingConfig,
    pub mqtt: MqttConfig,
    pub hub: HubConfig,
    pub docker: DockerConfig,
    pub relay: RelayConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            logging: LoggingConfig::default(),
            mqtt: MqttConfig::default(),
            hub: HubConfig::default(),
            docker: DockerConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn load(path: impl AsRef<Path>) -> SysmResult<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| SysmError::Config(format!("Failed to read config: {}", e)))?;

            let config = toml::from_str(&contents)
                .map_err(|e| SysmError::Config(format!("Failed to parse config: {}", e)))?;
            info!("Loaded configuration from {:?}", path);
            config
        } else {
            warn!("Config file {:?} not found, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> SysmResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SysmError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SysmError::Config(format!("Failed to create config dir: {}", e)))?;
            }
        }

        std::fs::write(path.as_ref(), contents)
            .map_err(|e| SysmError::Config(format!("Failed to write config: {}", e)))?;

        info!("Configuration saved to {:?}", path.as_ref());
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `SYSM_*` overrides read through `lookup`. Values that do not
    /// parse are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let text = |key: &str| lookup(key);
        let flag = |key: &str| -> Option<bool> {
            let value = lookup(key)?;
            let parsed = parse_bool(&value);
            if parsed.is_none() {
                warn!("Ignoring {}={:?}: expected a boolean", key, value);
            }
            parsed
        };
        let number = |key: &str| -> Option<u64> {
            let value = lookup(key)?;
            let parsed = value.trim().parse::<u64>().ok();
            if parsed.is_none() {
                warn!("Ignoring {}={:?}: expected a number", key, value);
            }
            parsed
        };

        if let Some(ms) = number("SYSM_INTERVAL") {
            self.interval_ms = ms;
        }
        if let Some(level) = text("SYSM_LOG_LEVEL") {
            match LogLevel::parse(&level) {
                Some(level) => self.logging.level = level,
                None => warn!("Ignoring SYSM_LOG_LEVEL={:?}", level),
            }
        }
        if let Some(json) = flag("SYSM_LOG_JSON") {
            self.logging.json = json;
        }

        if let Some(enabled) = flag("SYSM_MQTT_ENABLED") {
            self.mqtt.enabled = enabled;
        }
        if let Some(host) = text("SYSM_MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = number("SYSM_MQTT_PORT") {
            match u16::try_from(port) {
                Ok(port) => self.mqtt.port = port,
                Err(_) => warn!("Ignoring SYSM_MQTT_PORT={}: out of range", port),
            }
        }
        if let Some(auth) = flag("SYSM_MQTT_USE_AUTH") {
            self.mqtt.auth = auth;
        }
        if let Some(username) = text("SYSM_MQTT_USERNAME") {
            self.mqtt.username = username;
        }
        if let Some(password) = text("SYSM_MQTT_PASSWORD") {
            self.mqtt.password = password;
        }

        if let Some(enabled) = flag("SYSM_HUB_ENABLED") {
            self.hub.enabled = enabled;
        }
        if let Some(host) = text("SYSM_HUB_HOST") {
            self.hub.host = host;
        }
        if let Some(tls) = flag("SYSM_HUB_TLS") {
            self.hub.tls = tls;
        }
        if let Some(ms) = number("SYSM_HUB_INTERVAL") {
            self.hub.interval_ms = ms;
        }
        if let Some(token) = text("SYSM_HUB_TOKEN") {
            self.hub.token = Some(token);
        }
        if let Some(retry) = flag("SYSM_HUB_RETRY_ON_AUTH_FAILURE") {
            self.hub.retry_on_auth_failure = retry;
        }

        if let Some(enabled) = flag("SYSM_DOCKER_ENABLED") {
            self.docker.enabled = enabled;
        }
        if let Some(socket) = text("SYSM_DOCKER_SOCKET") {
            self.docker.socket = PathBuf::from(socket);
        }
        if let Some(containers) = text("SYSM_DOCKER_CONTAINERS") {
            self.docker.containers = containers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(ms) = number("SYSM_DOCKER_INTERVAL") {
            self.docker.interval_ms = ms;
        }

        if let Some(enabled) = flag("SYSM_SERVER_ENABLED") {
            self.relay.enabled = enabled;
        }
        if let Some(host) = text("SYSM_SERVER_HOST") {
            self.relay.host = host;
        }
        if let Some(tls) = flag("SYSM_SERVER_TLS") {
            self.relay.tls = tls;
        }
        if let Some(token) = text("SYSM_SERVER_TOKEN") {
            self.relay.token = Some(token);
        }
        if let Some(app_id) = text("SYSM_SERVER_APP_ID") {
            self.relay.app_id = Some(app_id);
        }
    }

    pub fn validate(&self) -> SysmResult<()> {
        if self.interval_ms == 0 {
            return Err(SysmError::Config("interval_ms cannot be 0".into()));
        }

        if self.mqtt.enabled {
            if self.mqtt.host.trim().is_empty() {
                return Err(SysmError::Config("mqtt.host cannot be empty".into()));
            }
            if self.mqtt.port == 0 {
                return Err(SysmError::Config("mqtt.port cannot be 0".into()));
            }
            if self.mqtt.auth && self.mqtt.username.is_empty() {
                warn!("mqtt.auth is on but no username is configured");
            }
        }

        if self.hub.enabled {
            if self.hub.host.trim().is_empty() {
                return Err(SysmError::Config("hub.host cannot be empty".into()));
            }
            if self.hub.interval_ms == 0 {
                return Err(SysmError::Config("hub.interval_ms cannot be 0".into()));
            }
        }

        if self.docker.enabled {
            if self.docker.socket.as_os_str().is_empty() {
                return Err(SysmError::Config("docker.socket cannot be empty".into()));
            }
            if self.docker.interval_ms == 0 {
                return Err(SysmError::Config("docker.interval_ms cannot be 0".into()));
            }
            if self.docker.containers.is_empty() {
                warn!("docker is enabled but no containers are watched");
            }
        }

        if self.relay.enabled {
            if self.relay.host.trim().is_empty() {
                return Err(SysmError::Config("relay.host cannot be empty".into()));
            }
            if self.relay.token.as_deref().map(str::is_empty).unwrap_or(true) {
                return Err(SysmError::Config(
                    "relay is enabled but no token is set. Set SYSM_SERVER_TOKEN.".into(),
                ));
            }
            if self.relay.interval_ms == 0 {
                return Err(SysmError::Config("relay.interval_ms cannot be 0".into()));
            }
        }

        Ok(())
    }

    pub fn redacted(&self) -> RedactedConfig {
        RedactedConfig {
            interval_ms: self.interval_ms,
            log_level: self.logging.level,
            backends: vec![
                (
                    "mqtt",
                    self.mqtt.enabled,
                    format!(
                        "{}:{} (auth: {}, user: {})",
                        self.mqtt.host,
                        self.mqtt.port,
                        self.mqtt.auth,
                        mask(&self.mqtt.username)
                    ),
                ),
                (
                    "hub",
                    self.hub.enabled,
                    format!(
                        "{} / {} every {}ms (token: {})",
                        self.hub.rest_url(),
                        self.hub.ws_url(),
                        self.hub.interval_ms,
                        secret(self.hub.token.as_deref())
                    ),
                ),
                (
                    "docker",
                    self.docker.enabled,
                    format!(
                        "{:?} every {}ms, watching {:?}",
                        self.docker.socket, self.docker.interval_ms, self.docker.containers
                    ),
                ),
                (
                    "relay",
                    self.relay.enabled,
                    format!(
                        "{} (token: {}, app id: {})",
                        self.relay.url(),
                        secret(self.relay.token.as_deref()),
                        self.relay.app_id.as_deref().unwrap_or("-")
                    ),
                ),
            ],
        }
    }
}

fn mask(value: &str) -> &'static str {
    if value.is_empty() {
        "-"
    } else {
        "***"
    }
}

fn secret(value: Option<&str>) -> &'static str {
    mask(value.unwrap_or_default())
}

#[derive(Debug)]
pub struct RedactedConfig {
    pub interval_ms: u64,
    pub log_level: LogLevel,
    pub backends: Vec<(&'static str, bool, String)>,
}

impl std::fmt::Display for RedactedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "sysm Agent Configuration")?;
        writeln!(f, "========================")?;
        writeln!(f, "Interval: {}ms", self.interval_ms)?;
        writeln!(f, "Log level: {}", self.log_level)?;
        writeln!(f, "Backends:")?;
        for (name, enabled, summary) in &self.backends {
            let marker = if *enabled { "on " } else { "off" };
            writeln!(f, "  [{}] {}: {}", marker, name, summary)?;
        }
        Ok(())
    }
}
