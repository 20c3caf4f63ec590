#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod aggregator;
pub mod backends;
pub mod config;
pub mod handshake;
pub mod relay;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use agent::{Agent, Service};
pub use aggregator::{merge_records, StatusAggregator};
pub use backends::{DockerProbe, HubRestProbe, HubWsLink, MqttLink};
pub use config::{AgentConfig, DockerConfig, HubConfig, LogLevel, LoggingConfig, MqttConfig, RelayConfig};
pub use relay::{RelayChannel, RelayLink, RelaySender, RelaySink};
pub use supervisor::{
    ConnectionState, ConnectionSupervisor, Link, Probe, ProbeReport, RetryPolicy, Subscription, SupervisorStats,
};
