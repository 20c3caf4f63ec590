use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::constants::DEFAULT_RELAY_INTERVAL_MS;
use super::types::{scheme, trim_host};

/// Upstream collector the merged status is relayed to.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub enabled: bool,
    pub host: String,
    pub tls: bool,
    pub token: Option<String>,
    pub app_id: Option<String>,
    pub interval_ms: u64,
    /// Resend the current payload this often even when unchanged. 0 = off.
    pub resend_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            tls: true,
            token: None,
            app_id: None,
            interval_ms: DEFAULT_RELAY_INTERVAL_MS,
            resend_interval_secs: 0,
        }
    }
}

impl RelayConfig {
    pub fn url(&self) -> String {
        format!("{}://{}", scheme(self.tls, "wss", "ws"), trim_host(&self.host))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn resend_interval(&self) -> Option<Duration> {
        (self.resend_interval_secs > 0).then(|| Duration::from_secs(self.resend_interval_secs))
    }
}
