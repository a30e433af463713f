//! Shared fakes for the notification pipeline tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};

use rk_core::config::{DeviceConfig, PushConfig};
use rk_core::constants;
use rk_core::error::{RkError, RkResult};
use rk_core::kv::{KeyValueStore, MemoryStore};
use rk_core::platform::DeviceOs;
use rk_services::presenter::{LocalNotification, NotificationBackend, NotificationChannel};
use rk_services::{
    AuthorizationStatus, CountsApi, EventBus, NotificationAggregator, NotificationPresenter,
    PushBridge, PushMessage, PushMessaging, PushTokenRegistrar,
};
use rk_socket::{
    ConnectionState, Connector, Link, LinkEvent, ReconnectPolicy, SocketClient, StaticCredentials,
};

pub const AUTH_TOKEN: &str = "jwt-abc";

// --- REST counts ---

/// Scripted counts. `hold` parks every fetch until `release`.
pub struct MockCountsApi {
    counts: Mutex<(u64, u64)>,
    failing: Mutex<bool>,
    calls: Mutex<usize>,
    gate: watch::Sender<bool>,
}

impl Default for MockCountsApi {
    fn default() -> Self {
        Self {
            counts: Mutex::new((0, 0)),
            failing: Mutex::new(false),
            calls: Mutex::new(0),
            gate: watch::channel(true).0,
        }
    }
}

impl MockCountsApi {
    pub fn returning(unread: u64, pending: u64) -> Arc<Self> {
        let api = Self::default();
        *api.counts.lock().unwrap() = (unread, pending);
        Arc::new(api)
    }

    pub fn set(&self, unread: u64, pending: u64) {
        *self.counts.lock().unwrap() = (unread, pending);
    }

    pub fn fail(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Number of unread-count fetches started.
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    async fn pass_gate(&self) {
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[async_trait]
impl CountsApi for MockCountsApi {
    async fn unread_chat_count(&self) -> RkResult<u64> {
        *self.calls.lock().unwrap() += 1;
        self.pass_gate().await;
        if *self.failing.lock().unwrap() {
            return Err(RkError::Http("connection refused".into()));
        }
        Ok(self.counts.lock().unwrap().0)
    }

    async fn pending_bookings_count(&self) -> RkResult<u64> {
        self.pass_gate().await;
        if *self.failing.lock().unwrap() {
            return Err(RkError::Http("connection refused".into()));
        }
        Ok(self.counts.lock().unwrap().1)
    }
}

// --- Local notifications ---

#[derive(Default)]
pub struct RecordingBackend {
    shown: Mutex<Vec<LocalNotification>>,
}

impl RecordingBackend {
    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .map(|n| (n.title.clone(), n.body.clone()))
            .collect()
    }

    pub fn last(&self) -> Option<LocalNotification> {
        self.shown.lock().unwrap().last().cloned()
    }
}

impl NotificationBackend for RecordingBackend {
    fn create_channel(&self, _channel: &NotificationChannel) -> RkResult<()> {
        Ok(())
    }

    fn display(&self, notification: &LocalNotification) -> RkResult<()> {
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

// --- Push SDK ---

pub struct MockPushMessaging {
    pub authorization: Mutex<AuthorizationStatus>,
    pub token: Mutex<Option<String>>,
    pub initial: Mutex<Option<PushMessage>>,
    pub token_refresh: broadcast::Sender<String>,
    pub foreground: broadcast::Sender<PushMessage>,
    pub opened: broadcast::Sender<PushMessage>,
}

impl MockPushMessaging {
    pub fn new(authorization: AuthorizationStatus, token: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            authorization: Mutex::new(authorization),
            token: Mutex::new(token.map(str::to_string)),
            initial: Mutex::new(None),
            token_refresh: broadcast::channel(8).0,
            foreground: broadcast::channel(8).0,
            opened: broadcast::channel(8).0,
        })
    }

    pub fn denied() -> Arc<Self> {
        Self::new(AuthorizationStatus::Denied, None)
    }
}

#[async_trait]
impl PushMessaging for MockPushMessaging {
    async fn request_authorization(&self) -> RkResult<AuthorizationStatus> {
        Ok(*self.authorization.lock().unwrap())
    }

    async fn request_runtime_permission(&self) -> RkResult<bool> {
        Ok(self.authorization.lock().unwrap().allows_notifications())
    }

    async fn token(&self) -> RkResult<Option<String>> {
        Ok(self.token.lock().unwrap().clone())
    }

    async fn initial_notification(&self) -> RkResult<Option<PushMessage>> {
        Ok(self.initial.lock().unwrap().take())
    }

    fn subscribe_token_refresh(&self) -> broadcast::Receiver<String> {
        self.token_refresh.subscribe()
    }

    fn subscribe_foreground(&self) -> broadcast::Receiver<PushMessage> {
        self.foreground.subscribe()
    }

    fn subscribe_opened(&self) -> broadcast::Receiver<PushMessage> {
        self.opened.subscribe()
    }
}

/// Records every POST attempt, failed ones included.
#[derive(Default)]
pub struct MockRegistrar {
    posts: Mutex<Vec<String>>,
    failing: Mutex<bool>,
}

impl MockRegistrar {
    pub fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }

    pub fn fail(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl PushTokenRegistrar for MockRegistrar {
    async fn register_push_token(&self, token: &str) -> RkResult<()> {
        self.posts.lock().unwrap().push(token.to_string());
        if *self.failing.lock().unwrap() {
            return Err(RkError::ServerError {
                status: 500,
                message: "database unavailable".into(),
            });
        }
        Ok(())
    }
}

// --- Socket ---

struct ServerSide {
    events: mpsc::UnboundedSender<LinkEvent>,
    received: mpsc::UnboundedReceiver<String>,
}

/// In-memory connector; opens past the end of the script succeed.
#[derive(Default)]
pub struct MockConnector {
    script: Mutex<VecDeque<bool>>,
    opens: Mutex<usize>,
    links: Mutex<Vec<ServerSide>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open_count(&self) -> usize {
        *self.opens.lock().unwrap()
    }

    pub fn push_frame(&self, index: usize, text: &str) {
        let links = self.links.lock().unwrap();
        let _ = links[index].events.send(LinkEvent::Frame(text.to_string()));
    }

    pub fn close(&self, index: usize) {
        let links = self.links.lock().unwrap();
        let _ = links[index].events.send(LinkEvent::Closed);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, _url: &str) -> RkResult<Link> {
        *self.opens.lock().unwrap() += 1;
        if !self.script.lock().unwrap().pop_front().unwrap_or(true) {
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

// --- Fixture ---

/// One isolated pipeline: store, fakes, and the pieces built on them.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub api: Arc<MockCountsApi>,
    pub backend: Arc<RecordingBackend>,
    pub messaging: Arc<MockPushMessaging>,
    pub registrar: Arc<MockRegistrar>,
    pub connector: Arc<MockConnector>,
    pub bus: EventBus,
}

impl Harness {
    /// Logged-in user, push denied, REST counts (0, 0).
    pub fn new() -> Self {
        Self::with_messaging(MockPushMessaging::denied())
    }

    pub fn with_messaging(messaging: Arc<MockPushMessaging>) -> Self {
        Self {
            store: Arc::new(MemoryStore::with_entries([(
                constants::AUTH_TOKEN_KEY,
                AUTH_TOKEN,
            )])),
            api: MockCountsApi::returning(0, 0),
            backend: Arc::new(RecordingBackend::default()),
            messaging,
            registrar: Arc::new(MockRegistrar::default()),
            connector: MockConnector::new(),
            bus: EventBus::new(64),
        }
    }

    pub fn logged_out(self) -> Self {
        self.store.remove(constants::AUTH_TOKEN_KEY).unwrap();
        self
    }

    pub fn aggregator(&self) -> Arc<NotificationAggregator> {
        let presenter =
            NotificationPresenter::new(self.backend.clone(), DeviceOs::Ios, &PushConfig::default());
        Arc::new(NotificationAggregator::new(
            self.api.clone(),
            Arc::new(presenter),
            self.bus.clone(),
        ))
    }

    pub fn bridge(&self, os: DeviceOs, os_version: u32) -> Arc<PushBridge> {
        Arc::new(
            PushBridge::new(
                self.messaging.clone(),
                self.registrar.clone(),
                self.store.clone(),
                DeviceConfig { os, os_version },
            )
            .with_event_bus(self.bus.clone()),
        )
    }

    pub fn socket(&self) -> SocketClient {
        SocketClient::new(
            "ws://localhost:8080/ws",
            Arc::new(StaticCredentials(Some(AUTH_TOKEN.to_string()))),
            self.connector.clone(),
            ReconnectPolicy::default(),
        )
    }
}

pub async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|s| *s == want))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {want}"))
        .unwrap();
}

/// Poll `condition` until it holds, letting spawned tasks run in between.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}
