//! Adapters that turn each backend's wire protocol into probe outcomes or
//! link sessions.

mod docker;
mod hub_rest;
mod hub_ws;
mod mqtt;

pub use docker::{evaluate_containers, ContainerSummary, DockerError, DockerProbe};
pub use hub_rest::HubRestProbe;
pub use hub_ws::HubWsLink;
pub use mqtt::MqttLink;

pub const MQTT_ID: &str = "mqtt";
pub const HUB_HTTP_ID: &str = "hub-http";
pub const HUB_WS_ID: &str = "hub-ws";
pub const DOCKER_ID: &str = "docker";

/// Payload entry the two hub backends are merged into.
pub const HUB_SERVICE: &str = "hub";
