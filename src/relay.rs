//! Websocket connection to a single relay, used to publish events.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_socks::tcp::Socks5Stream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{client_async_tls, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use crate::event::Event;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),

    #[error("send failed: {0}")]
    Send(String),

    #[error("rejected by relay: {0}")]
    Rejected(String),

    #[error("connection closed before the relay answered")]
    Closed,
}

type Socket = WebSocketStream<MaybeTlsStream<Box<dyn AsyncReadWrite + Unpin + Send>>>;

/// An open websocket to one relay. Dropping it releases the socket;
/// [`RelayConnection::close`] additionally sends a close frame.
pub struct RelayConnection {
    url: String,
    ws: Socket,
}

/// Connect to `relay`, optionally through a SOCKS5 proxy, within `limit`.
pub async fn connect(
    relay: &str,
    socks_proxy: Option<&str>,
    limit: Duration,
) -> Result<RelayConnection, RelayError> {
    match timeout(limit, connect_ws(relay, socks_proxy)).await {
        Ok(Ok(ws)) => Ok(RelayConnection {
            url: relay.to_string(),
            ws,
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(RelayError::Timeout("connect", limit)),
    }
}

async fn connect_ws(relay: &str, socks_proxy: Option<&str>) -> Result<Socket, RelayError> {
    let url = Url::parse(relay).map_err(|e| RelayError::InvalidUrl(format!("{relay}: {e}")))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(RelayError::InvalidUrl(format!("{relay}: expected ws or wss")));
    }
    let host = url
        .host_str()
        .ok_or_else(|| RelayError::InvalidUrl(format!("{relay}: missing host")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| RelayError::InvalidUrl(format!("{relay}: missing port")))?;
    let req = relay
        .into_client_request()
        .map_err(|e| RelayError::InvalidUrl(e.to_string()))?;
    let stream: Box<dyn AsyncReadWrite + Unpin + Send> = if let Some(proxy) = socks_proxy {
        Box::new(
            Socks5Stream::connect(proxy, (host, port))
                .await
                .map_err(|e| RelayError::Connect(e.to_string()))?,
        )
    } else {
        Box::new(
            TcpStream::connect((host, port))
                .await
                .map_err(|e| RelayError::Connect(e.to_string()))?,
        )
    };
    let (ws, _) = client_async_tls(req, stream)
        .await
        .map_err(|e| RelayError::Connect(e.to_string()))?;
    Ok(ws)
}

impl RelayConnection {
    /// Send `["EVENT", ev]` and wait up to `limit` for the relay's
    /// `["OK", id, accepted, message]`.
    pub async fn publish(&mut self, ev: &Event, limit: Duration) -> Result<(), RelayError> {
        match timeout(limit, self.send_and_confirm(ev)).await {
            Ok(res) => res,
            Err(_) => Err(RelayError::Timeout("publish", limit)),
        }
    }

    async fn send_and_confirm(&mut self, ev: &Event) -> Result<(), RelayError> {
        let msg = serde_json::json!(["EVENT", ev]);
        self.ws
            .send(Message::Text(msg.to_string()))
            .await
            .map_err(|e| RelayError::Send(e.to_string()))?;

        while let Some(msg) = self.ws.next().await {
            match msg.map_err(|e| RelayError::Send(e.to_string()))? {
                Message::Text(txt) => {
                    if let Some(res) = parse_ok(&txt, &ev.id) {
                        return res;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err(RelayError::Closed)
    }

    /// Send a close frame, waiting at most `limit` for it to flush. Errors
    /// are ignored: the socket is dropped either way.
    pub async fn close(mut self, limit: Duration) {
        match timeout(limit, self.ws.close(None)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("close {}: {e}", self.url),
            Err(_) => debug!("close {}: timed out after {limit:?}", self.url),
        }
    }
}

/// Interpret a relay message as the answer for `id`. Returns `None` for
/// unrelated messages (NOTICE, OK for other ids, garbage).
fn parse_ok(txt: &str, id: &str) -> Option<Result<(), RelayError>> {
    let val = serde_json::from_str::<Value>(txt).ok()?;
    let arr = val.as_array()?;
    match arr.first().and_then(|v| v.as_str()) {
        Some("OK") if arr.get(1).and_then(|v| v.as_str()) == Some(id) => {
            let accepted = arr.get(2).and_then(|v| v.as_bool()).unwrap_or(false);
            let message = arr.get(3).and_then(|v| v.as_str()).unwrap_or_default();
            if accepted {
                Some(Ok(()))
            } else {
                Some(Err(RelayError::Rejected(message.to_string())))
            }
        }
        Some("NOTICE") => {
            debug!("notice: {}", arr.get(1).and_then(|v| v.as_str()).unwrap_or_default());
            None
        }
        _ => None,
    }
}

/// Blanket trait for boxed async read/write streams.
trait AsyncReadWrite: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}
