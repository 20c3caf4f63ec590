pub const DEFAULT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_HUB_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_DOCKER_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_RELAY_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";
pub const DEFAULT_CONFIG_PATH: &str = "./config.toml";
pub const SUPERVISOR_TOKEN_ENV: &str = "SUPERVISOR_TOKEN";
