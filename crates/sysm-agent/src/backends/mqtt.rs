use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet};
use std::time::Duration;
use sysm_types::BackendFailure;
use tracing::{debug, trace};

use crate::config::MqttConfig;
use crate::handshake::CONNECT_TIMEOUT;
use crate::supervisor::Link;

const KEEP_ALIVE: Duration = Duration::from_secs(5);
const REQUEST_CAPACITY: usize = 10;
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Failure code of a broker that refused our credentials.
pub const CODE_NOT_AUTHORIZED: &str = "NOT_AUTHORIZED";

/// Broker session. The broker's CONNACK is the success signal; losing the
/// event loop is the failure.
pub struct MqttLink {
    options: MqttOptions,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
}

impl MqttLink {
    pub fn new(config: &MqttConfig) -> Self {
        let client_id = format!("sysm-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, config.host.trim(), config.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        if config.auth {
            options.set_credentials(config.username.clone(), config.password.clone());
        }

        Self {
            options,
            client: None,
            eventloop: None,
        }
    }

    async fn await_connack(eventloop: &mut EventLoop) -> Result<(), BackendFailure> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) if ack.code == ConnectReturnCode::Success => {
                    return Ok(())
                }
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    return Err(refused(ack.code));
                }
                Ok(event) => trace!(?event, "mqtt event before connack"),
                Err(e) => return Err(connection_failure(&e)),
            }
        }
    }
}

fn refused(code: ConnectReturnCode) -> BackendFailure {
    match code {
        ConnectReturnCode::NotAuthorized | ConnectReturnCode::BadUserNamePassword => {
            BackendFailure::authentication(format!("connection refused: {:?}", code))
                .with_code(CODE_NOT_AUTHORIZED)
        }
        other => BackendFailure::protocol(format!("connection refused: {:?}", other)),
    }
}

pub(crate) fn connection_failure(err: &ConnectionError) -> BackendFailure {
    match err {
        ConnectionError::ConnectionRefused(code) => refused(*code),
        ConnectionError::Io(io_err) => BackendFailure::from_io(io_err),
        ConnectionError::NetworkTimeout => {
            BackendFailure::transport(err.to_string()).with_code("ETIMEDOUT")
        }
        other => BackendFailure::from_error_chain(other),
    }
}

#[async_trait]
impl Link for MqttLink {
    async fn connect(&mut self) -> Result<(), BackendFailure> {
        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        debug!(broker = ?self.options.broker_address(), "connecting to broker");

        match tokio::time::timeout(CONNECT_TIMEOUT, Self::await_connack(&mut eventloop)).await {
            Ok(Ok(())) => {
                self.client = Some(client);
                self.eventloop = Some(eventloop);
                Ok(())
            }
            Ok(Err(failure)) => Err(failure),
            Err(_) => Err(BackendFailure::transport("no CONNACK from broker").with_code("ETIMEDOUT")),
        }
    }

    async fn serve(&mut self) -> BackendFailure {
        let Some(eventloop) = self.eventloop.as_mut() else {
            return BackendFailure::transport("broker session not open").with_code("ENOTCONN");
        };
        loop {
            match eventloop.poll().await {
                Ok(event) => trace!(?event, "mqtt event"),
                Err(e) => return connection_failure(&e),
            }
        }
    }

    async fn close(&mut self) {
        let (Some(client), Some(mut eventloop)) = (self.client.take(), self.eventloop.take()) else {
            return;
        };
        if client.try_disconnect().is_err() {
            return;
        }

        let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => return true,
                    Ok(_) => {}
                    Err(_) => return false,
                }
            }
        })
        .await;
        trace!(?flushed, "broker session closed");
    }

    fn describe(&self, failure: &BackendFailure) -> String {
        match failure.code() {
            Some(code @ ("ECONNREFUSED" | "ENOTFOUND")) => format!("Unable to connect to host, {}", code),
            Some(CODE_NOT_AUTHORIZED) => "Unable to connect to host, not authorized".to_string(),
            _ => sysm_types::STATUS_NOT_CONNECTED.to_string(),
        }
    }
}
