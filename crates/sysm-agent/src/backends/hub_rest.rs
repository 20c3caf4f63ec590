use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use sysm_types::{BackendFailure, SysmError, SysmResult, STATUS_CONNECTED};
use tracing::debug;

use crate::config::HubConfig;
use crate::supervisor::{Probe, ProbeReport};

const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Polls the hub's REST API root. Any 2xx is healthy; its `message` field
/// becomes the status text.
pub struct HubRestProbe {
    client: Client,
    url: String,
    token: String,
}

impl HubRestProbe {
    pub fn new(config: &HubConfig) -> SysmResult<Self> {
        Self::with_url(config.rest_url(), config.resolve_token(), config.interval())
    }

    pub fn with_url(url: impl Into<String>, token: impl Into<String>, interval: Duration) -> SysmResult<Self> {
        let client = Client::builder()
            .timeout(interval.max(MIN_REQUEST_TIMEOUT))
            .build()
            .map_err(|e| SysmError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            token: token.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn request_failure(err: reqwest::Error) -> BackendFailure {
    if err.is_timeout() {
        return BackendFailure::transport(err.to_string()).with_code("ETIMEDOUT");
    }
    BackendFailure::from_error_chain(&err)
}

fn status_failure(status: StatusCode) -> BackendFailure {
    let message = format!("Request failed with status code {}", status.as_u16());
    let failure = if status == StatusCode::UNAUTHORIZED {
        BackendFailure::authentication(message)
    } else {
        BackendFailure::transport(message)
    };
    failure.with_code(status.as_u16().to_string())
}

#[async_trait]
impl Probe for HubRestProbe {
    async fn probe(&mut self) -> Result<ProbeReport, BackendFailure> {
        debug!("HTTP GET: {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(request_failure)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_failure(status));
        }

        // any 2xx is online, whatever the body
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!("failed to read hub response body: {}", e);
                return Ok(ProbeReport::online(STATUS_CONNECTED));
            }
        };
        let message = match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
            Err(e) => {
                debug!("hub response is not JSON: {}", e);
                None
            }
        };

        Ok(ProbeReport::online(message.unwrap_or_else(|| STATUS_CONNECTED.to_string())))
    }

    fn describe(&self, failure: &BackendFailure) -> String {
        if failure.is_authentication() {
            return "Not connected to server, authentication failed".to_string();
        }
        format!(
            "Not connected to server, {}",
            failure.code().unwrap_or("unknown reason")
        )
    }
}
