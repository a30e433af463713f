//! Link establishment.
//!
//! A `Connector` opens one bidirectional text link and bridges it into
//! tokio channels, so the transport never touches the WebSocket types and
//! tests can drive it with in-memory links.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use rk_core::error::{RkError, RkResult};

/// What the link reports back to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// One inbound text frame.
    Frame(String),
    /// A link-level error. Informational; a `Closed` follows if the link
    /// is gone.
    Error(String),
    /// The peer closed the link or it failed.
    Closed,
}

/// An open link. Dropping `outbound` closes it from our side; `events`
/// ends (returns `None`) once the link is fully gone.
pub struct Link {
    pub outbound: mpsc::UnboundedSender<String>,
    pub events: mpsc::UnboundedReceiver<LinkEvent>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a link to `url`. Resolves once the handshake has completed.
    async fn open(&self, url: &str) -> RkResult<Link>;
}

/// `Connector` over tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> RkResult<Link> {
        let (ws, response) = connect_async(url)
            .await
            .map_err(|e| RkError::Socket(format!("websocket handshake failed: {e}")))?;
        debug!("websocket handshake completed with status {}", response.status());

        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel::<LinkEvent>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = out_rx.recv() => match outgoing {
                        Some(text) => {
                            if let Err(e) = sink.send(Message::Text(text)).await {
                                let _ = ev_tx.send(LinkEvent::Error(e.to_string()));
                                let _ = ev_tx.send(LinkEvent::Closed);
                                break;
                            }
                        }
                        None => {
                            // Our side dropped the sender: close politely.
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    incoming = stream.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if ev_tx.send(LinkEvent::Frame(text)).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                            Ok(text) => {
                                if ev_tx.send(LinkEvent::Frame(text)).is_err() {
                                    break;
                                }
                            }
                            Err(_) => warn!("dropping non-utf8 binary frame"),
                        },
                        Some(Ok(Message::Close(frame))) => {
                            debug!("websocket closed by peer: {frame:?}");
                            let _ = ev_tx.send(LinkEvent::Closed);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = ev_tx.send(LinkEvent::Error(e.to_string()));
                            let _ = ev_tx.send(LinkEvent::Closed);
                            break;
                        }
                        None => {
                            let _ = ev_tx.send(LinkEvent::Closed);
                            break;
                        }
                    },
                }
            }
        });

        Ok(Link {
            outbound: out_tx,
            events: ev_rx,
        })
    }
}
