use serde::{Deserialize, Serialize};
use std::fmt;

use crate::failure::BackendFailure;

pub const STATUS_CONNECTED: &str = "Connected";
pub const STATUS_NOT_CONNECTED: &str = "Not connected";

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackendId({})", self.0)
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BackendId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusError {
    pub message: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl StatusError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<&BackendFailure> for StatusError {
    fn from(failure: &BackendFailure) -> Self {
        Self {
            message: failure.message().to_string(),
            detail: failure.detail().map(str::to_string),
        }
    }
}

/// Normalized health snapshot of one backend.
///
/// Records are values: a supervisor builds a fresh one for every observation
/// and never mutates one it has already published. Two records are the same
/// observation iff they compare equal field by field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    backend_id: BackendId,
    online: bool,
    status_text: String,
    error: Option<StatusError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extra: Option<serde_json::Value>,
}

impl StatusRecord {
    pub fn online(backend_id: BackendId, status_text: impl Into<String>) -> Self {
        Self {
            backend_id,
            online: true,
            status_text: status_text.into(),
            error: None,
            extra: None,
        }
    }

    pub fn offline(
        backend_id: BackendId,
        status_text: impl Into<String>,
        error: Option<StatusError>,
    ) -> Self {
        Self {
            backend_id,
            online: false,
            status_text: status_text.into(),
            error,
            extra: None,
        }
    }

    pub fn not_connected(backend_id: BackendId) -> Self {
        Self::offline(backend_id, STATUS_NOT_CONNECTED, None)
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn backend_id(&self) -> &BackendId {
        &self.backend_id
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn error(&self) -> Option<&StatusError> {
        self.error.as_ref()
    }

    pub fn extra(&self) -> Option<&serde_json::Value> {
        self.extra.as_ref()
    }
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.online { "online" } else { "offline" };
        write!(f, "[{}] {} ({})", self.backend_id, state, self.status_text)
    }
}
