use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use sysm_types::{BackendFailure, ServerMessage};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, trace};

use super::{ws_failure, CODE_AUTH_TIMEOUT};

/// Spelling of the token field in the `auth` message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenField {
    /// `{"type":"auth","access_token":...}`
    #[default]
    SnakeCase,
    /// `{"type":"auth","accessToken":...,"appId":...}`
    CamelCase,
}

#[derive(Clone)]
pub struct Credentials {
    token: String,
    app_id: Option<String>,
    field: TokenField,
}

impl Credentials {
    pub fn new(token: impl Into<String>, field: TokenField) -> Self {
        Self {
            token: token.into(),
            app_id: None,
            field,
        }
    }

    pub fn with_app_id(mut self, app_id: Option<String>) -> Self {
        self.app_id = app_id.filter(|id| !id.is_empty());
        self
    }

    pub fn auth_message(&self) -> String {
        let message = match self.field {
            TokenField::SnakeCase => json!({
                "type": "auth",
                "access_token": self.token,
            }),
            TokenField::CamelCase => {
                let mut message = json!({
                    "type": "auth",
                    "accessToken": self.token,
                });
                if let Some(app_id) = &self.app_id {
                    message["appId"] = json!(app_id);
                }
                message
            }
        };
        message.to_string()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"***")
            .field("app_id", &self.app_id)
            .field("field", &self.field)
            .finish()
    }
}

/// Runs the client side of the challenge/response handshake on an open
/// socket.
///
/// Both waits are bounded by `timeout`: first the wait for the
/// `auth_required` challenge, then the wait for the verdict, counted from
/// the first time the credentials were sent. A repeated challenge gets the
/// credentials again but never extends the deadline. Unknown or
/// unparseable messages are dropped.
pub async fn authenticate<S>(
    stream: &mut S,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<(), BackendFailure>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    let mut deadline = Instant::now() + timeout;
    let mut sent_auth = false;

    loop {
        let next = tokio::time::timeout_at(deadline, stream.next())
            .await
            .map_err(|_| {
                BackendFailure::liveness("server never responded to auth request")
                    .with_code(CODE_AUTH_TIMEOUT)
            })?;

        let text = match next {
            None => return Err(BackendFailure::transport("connection closed during handshake")),
            Some(Err(e)) => return Err(ws_failure(&e)),
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => {
                let failure = BackendFailure::transport("connection closed by server during handshake");
                return Err(match frame {
                    Some(frame) => failure.with_detail(frame.reason.into_owned()),
                    None => failure,
                });
            }
            Some(Ok(_)) => continue,
        };

        match serde_json::from_str::<ServerMessage>(&text) {
            Ok(ServerMessage::AuthRequired) => {
                debug!("authenticating");
                stream
                    .send(Message::Text(credentials.auth_message()))
                    .await
                    .map_err(|e| ws_failure(&e))?;
                if !sent_auth {
                    sent_auth = true;
                    deadline = Instant::now() + timeout;
                }
            }
            Ok(ServerMessage::AuthOk) => {
                debug!("authenticated");
                return Ok(());
            }
            Ok(ServerMessage::AuthInvalid { message }) => {
                return Err(BackendFailure::authentication(
                    message.unwrap_or_else(|| "invalid credentials".to_string()),
                ));
            }
            Ok(ServerMessage::Other) => trace!("ignoring non-handshake message"),
            Err(e) => debug!("dropping unparseable handshake message: {}", e),
        }
    }
}
