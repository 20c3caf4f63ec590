use futures::{Sink, SinkExt, Stream, StreamExt};
use std::time::Duration;
use sysm_types::BackendFailure;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, trace};

use super::{ws_failure, CODE_PING_TIMEOUT, HEARTBEAT_INTERVAL, PONG_TIMEOUT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Heartbeat {
    pub interval: Duration,
    pub pong_timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval: HEARTBEAT_INTERVAL,
            pong_timeout: PONG_TIMEOUT,
        }
    }
}

async fn next_outbound(outbound: &mut Option<&mut mpsc::Receiver<String>>) -> Option<String> {
    match outbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Keeps an authenticated socket alive until it dies and returns the cause.
///
/// Pings every `heartbeat.interval`; a ping unanswered for
/// `heartbeat.pong_timeout` ends the session with a liveness failure.
/// Text queued on `outbound` is written as it arrives.
pub async fn serve<S>(
    stream: &mut S,
    heartbeat: Heartbeat,
    mut outbound: Option<&mut mpsc::Receiver<String>>,
) -> BackendFailure
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pong_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if pong_deadline.is_none() {
                    if let Err(e) = stream.send(Message::Ping(Vec::new())).await {
                        return ws_failure(&e);
                    }
                    pong_deadline = Some(Instant::now() + heartbeat.pong_timeout);
                    trace!("ping sent");
                }
            }
            _ = tokio::time::sleep_until(pong_deadline.unwrap_or_else(Instant::now)), if pong_deadline.is_some() => {
                debug!("no pong within {:?}", heartbeat.pong_timeout);
                return BackendFailure::liveness("server not responding to ping")
                    .with_code(CODE_PING_TIMEOUT);
            }
            text = next_outbound(&mut outbound) => match text {
                Some(text) => {
                    if let Err(e) = stream.send(Message::Text(text)).await {
                        return ws_failure(&e);
                    }
                }
                None => outbound = None,
            },
            incoming = stream.next() => match incoming {
                None => return BackendFailure::transport("connection closed").with_code("ECONNRESET"),
                Some(Err(e)) => return ws_failure(&e),
                Some(Ok(Message::Pong(_))) => {
                    trace!("pong received");
                    pong_deadline = None;
                }
                Some(Ok(Message::Close(frame))) => {
                    let failure = BackendFailure::transport("connection closed by server");
                    return match frame {
                        Some(frame) => failure.with_detail(frame.reason.into_owned()),
                        None => failure,
                    };
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
