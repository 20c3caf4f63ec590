//! Composition root: builds every supervisor, the aggregator and the relay
//! from an [`AgentConfig`] and owns their shutdown.

use futures::future::join_all;
use std::time::Duration;
use sysm_types::{StatusRecord, SysmResult};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::aggregator::StatusAggregator;
use crate::backends::{
    DockerProbe, HubRestProbe, HubWsLink, MqttLink, DOCKER_ID, HUB_HTTP_ID, HUB_SERVICE, HUB_WS_ID, MQTT_ID,
};
use crate::config::AgentConfig;
use crate::relay::{RelayChannel, RelayLink};
use crate::supervisor::{stop_pair, ConnectionSupervisor, RetryPolicy, StopHandle};

/// Backends merged into one payload entry.
pub struct Service {
    pub id: String,
    pub backends: Vec<ConnectionSupervisor>,
}

impl Service {
    pub fn new(id: impl Into<String>, backends: Vec<ConnectionSupervisor>) -> Self {
        Self {
            id: id.into(),
            backends,
        }
    }
}

pub struct Agent {
    service_ids: Vec<String>,
    supervisors: Vec<ConnectionSupervisor>,
    relay: RelayChannel,
    aggregator: Option<StatusAggregator>,
    aggregator_task: Option<JoinHandle<()>>,
    stop: StopHandle,
}

impl Agent {
    pub fn from_config(config: &AgentConfig) -> SysmResult<Self> {
        let mut services = Vec::new();

        if config.mqtt.enabled {
            let policy = RetryPolicy::fixed(config.interval());
            let mqtt = ConnectionSupervisor::linked(MQTT_ID, MqttLink::new(&config.mqtt), policy);
            services.push(Service::new(MQTT_ID, vec![mqtt]));
        }

        if config.hub.enabled {
            let policy = RetryPolicy::fixed(config.hub.interval()).with_auth_retry(config.hub.retry_on_auth_failure);
            let rest = ConnectionSupervisor::polling(HUB_HTTP_ID, HubRestProbe::new(&config.hub)?, policy);
            let ws = ConnectionSupervisor::linked(HUB_WS_ID, HubWsLink::new(&config.hub), policy);
            services.push(Service::new(HUB_SERVICE, vec![rest, ws]));
        }

        if config.docker.enabled {
            let policy = RetryPolicy::fixed(config.docker.interval());
            let docker = ConnectionSupervisor::polling(DOCKER_ID, DockerProbe::new(&config.docker), policy);
            services.push(Service::new(DOCKER_ID, vec![docker]));
        }

        let relay_config = config.relay.clone();
        let relay = RelayChannel::new(
            move |outbound| RelayLink::from_config(&relay_config, outbound),
            RetryPolicy::fixed(config.relay.interval()).with_auth_retry(false),
        )
        .enabled(config.relay.enabled);

        Ok(Self::from_parts(services, relay, config.relay.resend_interval()))
    }

    /// Assembles an agent from already built supervisors. Disabled backends
    /// are dropped here, and a service left without backends is not
    /// registered at all.
    pub fn from_parts(services: Vec<Service>, relay: RelayChannel, resend_interval: Option<Duration>) -> Self {
        let mut aggregator = StatusAggregator::new().with_resend_interval(resend_interval);
        let mut service_ids = Vec::new();
        let mut supervisors = Vec::new();

        for service in services {
            let backends: Vec<ConnectionSupervisor> =
                service.backends.into_iter().filter(|s| s.is_enabled()).collect();
            if backends.is_empty() {
                debug!(service = %service.id, "no enabled backends, skipping");
                continue;
            }

            aggregator.register(service.id.clone(), backends.iter().map(|s| s.subscribe()).collect());
            service_ids.push(service.id);
            supervisors.extend(backends);
        }

        let (stop, _) = stop_pair();

        Self {
            service_ids,
            supervisors,
            relay,
            aggregator: Some(aggregator),
            aggregator_task: None,
            stop,
        }
    }

    pub fn service_ids(&self) -> Vec<&str> {
        self.service_ids.iter().map(String::as_str).collect()
    }

    pub fn supervisors(&self) -> &[ConnectionSupervisor] {
        &self.supervisors
    }

    pub fn relay(&self) -> &RelayChannel {
        &self.relay
    }

    /// Starts the aggregator, every supervisor and the relay. Only the first
    /// call does anything.
    pub fn start(&mut self) -> bool {
        let Some(aggregator) = self.aggregator.take() else {
            return false;
        };

        let task = aggregator.run(self.relay.sender(), self.relay.watch_state(), self.stop.token());
        self.aggregator_task = Some(tokio::spawn(task));

        for supervisor in &mut self.supervisors {
            supervisor.start();
        }
        if !self.relay.start() {
            info!("relay disabled, status stays local");
        }

        info!(services = ?self.service_ids, "agent started");
        true
    }

    pub async fn shutdown(&mut self, timeout: Duration) {
        info!("shutting down agent");
        self.stop.stop();

        join_all(self.supervisors.iter_mut().map(|s| s.shutdown(timeout))).await;
        self.relay.shutdown(timeout).await;

        if let Some(task) = self.aggregator_task.take() {
            if tokio::time::timeout(timeout, task).await.is_err() {
                warn!("aggregator did not stop in time");
            }
        }
        self.aggregator = None;
    }

    /// One check of every enabled backend, concurrently, without starting
    /// supervision.
    pub async fn check(&mut self) -> Vec<StatusRecord> {
        join_all(self.supervisors.iter_mut().map(|s| s.check_once()))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::{ConnectionState, ProbeReport};
    use crate::testing::{refused, FixedProbe, ForwardingLink, SteadyLink};
    use sysm_types::{AggregatedPayload, RelayEnvelope};
    use tokio::sync::mpsc;

    fn policy() -> RetryPolicy {
        RetryPolicy::fixed(Duration::from_millis(1000))
    }

    fn forwarding_relay() -> (RelayChannel, mpsc::UnboundedReceiver<String>) {
        let (delivered, rx) = mpsc::unbounded_channel();
        let relay = RelayChannel::new(
            |outbound| ForwardingLink {
                outbound,
                delivered,
                drop_after: None,
            },
            policy().with_auth_retry(false),
        );
        (relay, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<AggregatedPayload> {
        let mut payloads = Vec::new();
        while let Ok(text) = rx.try_recv() {
            let RelayEnvelope::Status { payload } = serde_json::from_str(&text).unwrap();
            payloads.push(payload);
        }
        payloads
    }

    #[tokio::test]
    async fn test_default_config_registers_enabled_services() {
        let agent = Agent::from_config(&AgentConfig::default()).unwrap();
        assert_eq!(agent.service_ids(), vec!["mqtt", "hub"]);

        let ids: Vec<&str> = agent.supervisors().iter().map(|s| s.id().as_str()).collect();
        assert_eq!(ids, vec!["mqtt", "hub-http", "hub-ws"]);
        assert!(!agent.relay().supervisor().is_enabled());
        assert!(!agent.relay().supervisor().policy().retry_on_auth_failure);
    }

    #[tokio::test]
    async fn test_disabled_backend_is_left_out() {
        let mut config = AgentConfig::default();
        config.mqtt.enabled = false;
        config.docker.enabled = true;
        config.docker.containers = vec!["mosquitto".into()];
        config.hub.retry_on_auth_failure = false;

        let agent = Agent::from_config(&config).unwrap();
        assert_eq!(agent.service_ids(), vec!["hub", "docker"]);
        assert!(agent.supervisors().iter().all(|s| s.id().as_str() != "mqtt"));

        let hub_ws = agent.supervisors().iter().find(|s| s.id().as_str() == "hub-ws").unwrap();
        assert!(!hub_ws.policy().retry_on_auth_failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relays_merged_status() {
        let mqtt = ConnectionSupervisor::linked("mqtt", SteadyLink(Ok(())), policy());
        let hub_http = ConnectionSupervisor::polling("hub-http", FixedProbe(Err(refused())), policy());
        let hub_ws = ConnectionSupervisor::linked("hub-ws", SteadyLink(Ok(())), policy());
        let docker = ConnectionSupervisor::polling(
            "docker",
            FixedProbe(Ok(ProbeReport::online("All containers running and healthy"))),
            policy(),
        )
        .enabled(false);

        let (relay, mut delivered) = forwarding_relay();
        let mut agent = Agent::from_parts(
            vec![
                Service::new("mqtt", vec![mqtt]),
                Service::new("hub", vec![hub_http, hub_ws]),
                Service::new("docker", vec![docker]),
            ],
            relay,
            None,
        );
        assert_eq!(agent.service_ids(), vec!["mqtt", "hub"]);

        assert!(agent.start());
        assert!(!agent.start());
        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(agent.relay().state(), ConnectionState::Connected);

        let payloads = drain(&mut delivered);
        let last = payloads.last().unwrap();
        assert_eq!(last.ids(), vec!["mqtt", "hub"]);
        assert!(last.get("mqtt").unwrap().online);

        let hub = last.get("hub").unwrap();
        assert!(!hub.online);
        assert_eq!(hub.status, "Not connected to server, ECONNREFUSED");
        assert!(payloads.windows(2).all(|pair| pair[0] != pair[1]));

        agent.shutdown(Duration::from_secs(1)).await;
        assert!(agent.supervisors().iter().all(|s| s.state() == ConnectionState::Stopped));
        assert_eq!(agent.relay().state(), ConnectionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_relayed_after_shutdown() {
        let mqtt = ConnectionSupervisor::linked("mqtt", SteadyLink(Ok(())), policy());
        let (relay, mut delivered) = forwarding_relay();
        let mut agent = Agent::from_parts(vec![Service::new("mqtt", vec![mqtt])], relay, Some(Duration::from_secs(5)));

        agent.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        agent.shutdown(Duration::from_secs(1)).await;
        drain(&mut delivered);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(drain(&mut delivered).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_runs_each_backend_once() {
        let mqtt = ConnectionSupervisor::linked("mqtt", SteadyLink(Ok(())), policy());
        let hub_http = ConnectionSupervisor::polling("hub-http", FixedProbe(Err(refused())), policy());
        let (relay, _delivered) = forwarding_relay();
        let mut agent = Agent::from_parts(
            vec![Service::new("mqtt", vec![mqtt]), Service::new("hub", vec![hub_http])],
            relay,
            None,
        );

        let records = agent.check().await;
        assert_eq!(records.len(), 2);
        assert!(records[0].is_online());
        assert_eq!(records[1].status_text(), "Not connected to server, ECONNREFUSED");
        assert!(agent.supervisors().iter().all(|s| s.stats().attempts == 1));
    }
}
