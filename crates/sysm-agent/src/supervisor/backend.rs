use async_trait::async_trait;
use sysm_types::{BackendFailure, BackendId, StatusRecord, STATUS_CONNECTED};

/// Outcome of one successful poll. A poll can succeed and still report the
/// backend as unhealthy, e.g. when only some watched containers run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeReport {
    pub online: bool,
    pub status: String,
    pub extra: Option<serde_json::Value>,
}

impl ProbeReport {
    pub fn online(status: impl Into<String>) -> Self {
        Self {
            online: true,
            status: status.into(),
            extra: None,
        }
    }

    pub fn degraded(status: impl Into<String>) -> Self {
        Self {
            online: false,
            status: status.into(),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn into_record(self, id: &BackendId) -> StatusRecord {
        let record = if self.online {
            StatusRecord::online(id.clone(), self.status)
        } else {
            StatusRecord::offline(id.clone(), self.status, None)
        };
        match self.extra {
            Some(extra) => record.with_extra(extra),
            None => record,
        }
    }
}

/// Poll-based backend: each check is a self-contained request.
#[async_trait]
pub trait Probe: Send + 'static {
    async fn probe(&mut self) -> Result<ProbeReport, BackendFailure>;

    /// Status text shown for a failed check.
    fn describe(&self, failure: &BackendFailure) -> String;

    fn failure_record(&self, id: &BackendId, failure: &BackendFailure) -> StatusRecord {
        StatusRecord::offline(id.clone(), self.describe(failure), Some(failure.to_status_error()))
    }

    fn initial_record(&self, id: &BackendId) -> StatusRecord {
        StatusRecord::not_connected(id.clone())
    }
}

/// Session-based backend: a long-lived connection whose loss is the failure.
#[async_trait]
pub trait Link: Send + 'static {
    async fn connect(&mut self) -> Result<(), BackendFailure>;

    /// Whether `authenticate` must run before the link counts as connected.
    fn requires_handshake(&self) -> bool {
        false
    }

    async fn authenticate(&mut self) -> Result<(), BackendFailure> {
        Ok(())
    }

    /// Runs the established session until it dies and returns the cause.
    async fn serve(&mut self) -> BackendFailure;

    async fn close(&mut self);

    fn describe(&self, failure: &BackendFailure) -> String;

    fn connected_record(&self, id: &BackendId) -> StatusRecord {
        StatusRecord::online(id.clone(), STATUS_CONNECTED)
    }

    fn failure_record(&self, id: &BackendId, failure: &BackendFailure) -> StatusRecord {
        StatusRecord::offline(id.clone(), self.describe(failure), Some(failure.to_status_error()))
    }

    fn initial_record(&self, id: &BackendId) -> StatusRecord {
        StatusRecord::not_connected(id.clone())
    }
}
