use serde::{Deserialize, Serialize};

use crate::status::{StatusError, StatusRecord};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub id: String,
    pub online: bool,
    pub status: String,
    pub error: Option<StatusError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl ServiceEntry {
    pub fn from_record(id: impl Into<String>, record: &StatusRecord) -> Self {
        Self {
            id: id.into(),
            online: record.is_online(),
            status: record.status_text().to_string(),
            error: record.error().cloned(),
            extra: record.extra().cloned(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedPayload {
    pub services: Vec<ServiceEntry>,
}

impl AggregatedPayload {
    pub fn get(&self, id: &str) -> Option<&ServiceEntry> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }
}

/// Outbound message to the upstream collector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEnvelope {
    Status { payload: AggregatedPayload },
}

/// Server side of the authentication handshake.
///
/// Both dialects in the wild are accepted: `auth_ok`/`auth_invalid` and
/// `auth_success`/`auth_failed`. Anything else is `Other` and is ignored by
/// the handshake.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthRequired,
    #[serde(alias = "auth_success")]
    AuthOk,
    #[serde(alias = "auth_failed")]
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Other,
}
