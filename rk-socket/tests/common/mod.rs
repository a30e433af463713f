//! In-memory connector for driving the transport without a network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use rk_core::error::{RkError, RkResult};
use rk_socket::{
    ConnectionState, Connector, Link, LinkEvent, ReconnectPolicy, SocketClient, StaticCredentials,
};

pub const WS_URL: &str = "ws://localhost:8080/ws";

#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub url: String,
    pub at: Instant,
}

/// Server half of one successfully opened link.
pub struct ServerSide {
    events: mpsc::UnboundedSender<LinkEvent>,
    received: mpsc::UnboundedReceiver<String>,
}

/// Records every open attempt; outcomes follow the script, and opens past
/// the end of the script succeed.
#[derive(Default)]
pub struct MockConnector {
    script: Mutex<VecDeque<bool>>,
    opens: Mutex<Vec<OpenRecord>>,
    links: Mutex<Vec<ServerSide>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `true` = handshake succeeds, `false` = handshake fails.
    pub fn scripted(outcomes: &[bool]) -> Arc<Self> {
        let connector = Self::default();
        connector.script.lock().unwrap().extend(outcomes.iter().copied());
        Arc::new(connector)
    }

    pub fn opens(&self) -> Vec<OpenRecord> {
        self.opens.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    /// Gaps between consecutive open attempts.
    pub fn open_gaps(&self) -> Vec<Duration> {
        self.opens()
            .windows(2)
            .map(|pair| pair[1].at - pair[0].at)
            .collect()
    }

    /// Push a text frame down link `index` (successful opens only).
    pub fn push_frame(&self, index: usize, text: &str) {
        let links = self.links.lock().unwrap();
        let _ = links[index].events.send(LinkEvent::Frame(text.to_string()));
    }

    /// Close link `index` from the server side.
    pub fn close(&self, index: usize) {
        let links = self.links.lock().unwrap();
        let _ = links[index].events.send(LinkEvent::Closed);
    }

    /// Frames the client sent on link `index` since the last call.
    pub fn received(&self, index: usize) -> Vec<String> {
        let mut links = self.links.lock().unwrap();
        let mut frames = Vec::new();
        while let Ok(text) = links[index].received.try_recv() {
            frames.push(text);
        }
        frames
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> RkResult<Link> {
        self.opens.lock().unwrap().push(OpenRecord {
            url: url.to_string(),
            at: Instant::now(),
        });

        let succeed = self.script.lock().unwrap().pop_front().unwrap_or(true);
        if !succeed {
            return Err(RkError::Socket("handshake refused".into()));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        self.links.lock().unwrap().push(ServerSide {
            events: ev_tx,
            received: out_rx,
        });
        Ok(Link {
            outbound: out_tx,
            events: ev_rx,
        })
    }
}

pub fn client_with(connector: Arc<MockConnector>, token: Option<&str>) -> SocketClient {
    SocketClient::new(
        WS_URL,
        Arc::new(StaticCredentials(token.map(str::to_string))),
        connector,
        ReconnectPolicy::default(),
    )
}

pub async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|s| *s == want))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {want}"))
        .unwrap();
}
