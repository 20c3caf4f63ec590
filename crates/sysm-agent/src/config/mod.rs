mod agent;
mod backends;
mod constants;
mod logging;
mod relay;
mod types;

pub use agent::{AgentConfig, RedactedConfig};
pub use backends::{DockerConfig, HubConfig, MqttConfig};
pub use constants::*;
pub use logging::LoggingConfig;
pub use relay::RelayConfig;
pub use types::LogLevel;
