//! Gateway Transport
//!
//! Byte-frame transport between a session and the game gateway. A
//! `Connector` opens a connection and hands back a pair of channels; the
//! socket itself is driven by background reader and writer tasks so the
//! session never touches it directly.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, ORIGIN, USER_AGENT};
use tokio_tungstenite::tungstenite::Message;

use crate::shared::error::ProtocolError;

/// Inbound traffic from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One binary frame
    Frame(Vec<u8>),
    /// The connection is gone; carries a reason when one is known.
    Closed(Option<String>),
}

/// An open connection.
///
/// Dropping `outbound` closes the socket.
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<Vec<u8>>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens gateway connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Connection, ProtocolError>;
}

/// WebSocket connector on `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    user_agent: String,
    origin: String,
}

impl WebSocketConnector {
    pub fn new(user_agent: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            origin: origin.into(),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Connection, ProtocolError> {
        let mut request = url.into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(USER_AGENT, header_value(&self.user_agent)?);
        if !self.origin.is_empty() {
            headers.insert(ORIGIN, header_value(&self.origin)?);
        }

        let (stream, response) = tokio_tungstenite::connect_async(request).await?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<TransportEvent>();

        // Writer: forward queued frames until the session drops its sender
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Binary(frame)).await {
                    tracing::debug!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: translate socket messages into transport events
        tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Binary(data))) => {
                        if inbound_tx.send(TransportEvent::Frame(data)).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break Some(match frame {
                            Some(f) => {
                                format!("closed by server: {} {}", u16::from(f.code), f.reason)
                            }
                            None => "closed by server".to_string(),
                        });
                    }
                    Some(Ok(_)) => {} // Text, ping and pong carry nothing for us
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            };
            let _ = inbound_tx.send(TransportEvent::Closed(reason));
        });

        Ok(Connection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ProtocolError> {
    HeaderValue::from_str(value)
        .map_err(|e| ProtocolError::Transport(format!("invalid header value: {e}")))
}
