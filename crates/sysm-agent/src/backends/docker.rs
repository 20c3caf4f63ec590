use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{HeaderValue, HOST};
use hyper::{Request, Uri};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use sysm_types::{BackendFailure, BackendId, StatusRecord};
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::debug;

use crate::config::DockerConfig;
use crate::supervisor::{Probe, ProbeReport};

const CONTAINERS_PATH: &str = "/v1.39/containers/json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const NOT_RUNNING: &str = "Not running";

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("failed to connect to {path:?}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("invalid container list: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,
}

impl DockerError {
    pub fn to_failure(&self) -> BackendFailure {
        match self {
            DockerError::Connect { source, .. } => BackendFailure::from_io(source),
            DockerError::Http(_) => BackendFailure::from_error_chain(self),
            DockerError::Status(code) => BackendFailure::transport(self.to_string()).with_code(code.to_string()),
            DockerError::Decode(_) => BackendFailure::protocol(self.to_string()),
            DockerError::Timeout => BackendFailure::transport(self.to_string()).with_code("ETIMEDOUT"),
        }
    }
}

/// The fields of the engine's container listing this probe reads.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub state: String,
}

/// Matches every watched name against the listing. A watched container is
/// healthy when one of the listed containers' names contains it and that
/// container is running.
pub fn evaluate_containers(watched: &[String], listed: &[ContainerSummary]) -> ProbeReport {
    let containers: Vec<serde_json::Value> = watched
        .iter()
        .map(|name| {
            let found = listed
                .iter()
                .find(|c| c.names.iter().any(|n| n.contains(name.as_str())));
            let state = found.map(|c| c.state.as_str()).unwrap_or(NOT_RUNNING);
            json!({
                "name": name,
                "running": state == "running",
                "state": state,
            })
        })
        .collect();

    let healthy = containers.iter().filter(|c| c["running"] == true).count();
    let total = containers.len();
    let report = if healthy == total {
        ProbeReport::online("All containers running and healthy")
    } else {
        ProbeReport::degraded(format!("{}/{} healthy", healthy, total))
    };
    report.with_extra(json!({ "containers": containers }))
}

/// Watches containers through the engine API on its Unix socket.
pub struct DockerProbe {
    socket: PathBuf,
    containers: Vec<String>,
}

impl DockerProbe {
    pub fn new(config: &DockerConfig) -> Self {
        Self {
            socket: config.socket.clone(),
            containers: config.containers.clone(),
        }
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, DockerError> {
        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|source| DockerError::Connect {
                path: self.socket.clone(),
                source,
            })?;

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("docker connection closed: {}", e);
            }
        });

        let mut request = Request::new(Empty::<Bytes>::new());
        *request.uri_mut() = Uri::from_static(CONTAINERS_PATH);
        request.headers_mut().insert(HOST, HeaderValue::from_static("docker"));

        let response = sender.send_request(request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();

        if !status.is_success() {
            return Err(DockerError::Status(status.as_u16()));
        }
        Ok(serde_json::from_slice(&body)?)
    }

    fn not_running(&self) -> serde_json::Value {
        let containers: Vec<serde_json::Value> = self
            .containers
            .iter()
            .map(|name| json!({ "name": name, "running": false, "state": NOT_RUNNING }))
            .collect();
        json!({ "containers": containers })
    }
}

#[async_trait]
impl Probe for DockerProbe {
    async fn probe(&mut self) -> Result<ProbeReport, BackendFailure> {
        let listed = tokio::time::timeout(REQUEST_TIMEOUT, self.list_containers())
            .await
            .map_err(|_| DockerError::Timeout.to_failure())?
            .map_err(|e| e.to_failure())?;

        Ok(evaluate_containers(&self.containers, &listed))
    }

    fn describe(&self, _failure: &BackendFailure) -> String {
        "Server error".to_string()
    }

    fn failure_record(&self, id: &BackendId, failure: &BackendFailure) -> StatusRecord {
        StatusRecord::offline(id.clone(), self.describe(failure), Some(failure.to_status_error()))
            .with_extra(json!({ "containers": [] }))
    }

    fn initial_record(&self, id: &BackendId) -> StatusRecord {
        StatusRecord::offline(id.clone(), NOT_RUNNING, None).with_extra(self.not_running())
    }
}
