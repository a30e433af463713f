//! Session transport.
//!
//! Owns at most one live link at a time. Each connect or reconnect attempt
//! is a new session with its own id and generation number; events from a
//! session that has since been replaced or intentionally closed are
//! ignored. After an unexpected close the transport reconnects with linear
//! backoff (`attempt * base_delay`) until the attempt ceiling is reached,
//! then parks in `Failed` until the next explicit `connect()`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use rk_core::config::SocketConfig;
use rk_core::constants;
use rk_core::error::{RkError, RkResult};
use rk_core::kv::KeyValueStore;

use crate::connector::{Connector, Link, LinkEvent};
use crate::frames::OutboundFrame;
use crate::router::EventRouter;

/// Reconnect policy: up to `max_attempts` reconnects, attempt `n` waiting
/// `n * base_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: Duration::from_millis(constants::DEFAULT_RECONNECT_BASE_DELAY_MS),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl From<&SocketConfig> for ReconnectPolicy {
    fn from(config: &SocketConfig) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts,
            base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
        }
    }
}

/// Source of the auth token used to open a session.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn auth_token(&self) -> RkResult<Option<String>>;
}

/// Reads the token from the persistent key-value store.
pub struct StoredCredentials {
    store: Arc<dyn KeyValueStore>,
}

impl StoredCredentials {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialProvider for StoredCredentials {
    async fn auth_token(&self) -> RkResult<Option<String>> {
        self.store.get(constants::AUTH_TOKEN_KEY)
    }
}

/// A fixed token, mostly for tests and one-shot tools.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Option<String>);

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn auth_token(&self) -> RkResult<Option<String>> {
        Ok(self.0.clone())
    }
}

/// Transport connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to connect.
    Disconnected,
    /// A session is being opened.
    Connecting,
    /// The link is open.
    Open,
    /// The link dropped; a reconnect is scheduled.
    Reconnecting,
    /// Reconnect attempts are exhausted. Only an explicit connect leaves
    /// this state.
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

struct ActiveSession {
    id: Uuid,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
    intentional_close: Arc<AtomicBool>,
}

struct Inner {
    ws_url: String,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn Connector>,
    router: Arc<EventRouter>,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
    session: Mutex<Option<ActiveSession>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    retry: AtomicU32,
    /// Bumped for every new session and every disconnect.
    generation: AtomicU64,
}

/// WebSocket session manager.
#[derive(Clone)]
pub struct SessionTransport {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionTransport {
    pub fn new(
        ws_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
        router: Arc<EventRouter>,
    ) -> Self {
        Self::with_policy(ws_url, credentials, connector, router, ReconnectPolicy::default())
    }

    pub fn with_policy(
        ws_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
        router: Arc<EventRouter>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                ws_url: ws_url.into(),
                credentials,
                connector,
                router,
                policy,
                state_tx,
                session: Mutex::new(None),
                reconnect_task: Mutex::new(None),
                retry: AtomicU32::new(0),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.inner.router
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.inner.policy
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Reconnect attempts made since the last successful open.
    pub fn retry_count(&self) -> u32 {
        self.inner.retry.load(Ordering::SeqCst)
    }

    /// Id of the current session, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        lock(&self.inner.session).as_ref().map(|s| s.id)
    }

    /// Start a new session.
    ///
    /// Returns once the session task is spawned; watch `state_receiver()`
    /// for the open. A no-op while already connecting or open. Resets the
    /// reconnect counter and cancels any pending scheduled reconnect.
    pub async fn connect(&self) -> RkResult<()> {
        let state = self.state();
        if matches!(state, ConnectionState::Connecting | ConnectionState::Open) {
            debug!("socket already {state}, skipping connect");
            return Ok(());
        }

        self.inner.retry.store(0, Ordering::SeqCst);
        if let Some(pending) = lock(&self.inner.reconnect_task).take() {
            pending.abort();
        }

        Inner::open_session(&self.inner, ConnectionState::Disconnected).await
    }

    /// Close the current session on purpose. Never schedules a reconnect.
    /// Also drops every listener registered on the router.
    pub fn disconnect(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(pending) = lock(&self.inner.reconnect_task).take() {
            pending.abort();
        }

        if let Some(mut session) = lock(&self.inner.session).take() {
            session.intentional_close.store(true, Ordering::SeqCst);
            session.outbound.take();
            if let Some(task) = session.task.take() {
                task.abort();
            }
            info!(session = %session.id, "socket closed by client");
        }

        self.inner.router.clear_all();
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Send a frame on the open link. Frames sent while not open are
    /// logged and dropped. Returns whether the frame was handed to the link.
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        if !self.is_connected() {
            error!("socket is not connected, dropping {frame:?}");
            return false;
        }

        let text = match frame.to_text() {
            Ok(text) => text,
            Err(e) => {
                error!("failed to encode outbound frame: {e}");
                return false;
            }
        };

        let session = lock(&self.inner.session);
        match session.as_ref().and_then(|s| s.outbound.as_ref()) {
            Some(outbound) => outbound.send(text).is_ok(),
            None => {
                error!("socket link unavailable, dropping {frame:?}");
                false
            }
        }
    }
}

impl Inner {
    fn set_state(&self, new_state: ConnectionState) {
        self.state_tx.send_if_modified(|state| {
            if *state == new_state {
                return false;
            }
            info!("socket state: {} -> {}", *state, new_state);
            *state = new_state;
            true
        });
    }

    /// Claim the `Connecting` state unless a session is already connecting
    /// or open.
    fn claim_connecting(&self) -> bool {
        self.state_tx.send_if_modified(|state| {
            if matches!(state, ConnectionState::Connecting | ConnectionState::Open) {
                return false;
            }
            info!("socket state: {} -> {}", *state, ConnectionState::Connecting);
            *state = ConnectionState::Connecting;
            true
        })
    }

    fn build_url(&self, token: &str) -> RkResult<String> {
        let mut url = reqwest::Url::parse(&self.ws_url)
            .map_err(|e| RkError::Config(format!("invalid websocket url {}: {e}", self.ws_url)))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url.into())
    }

    /// Open a new session. `on_missing_credential` is the state to fall
    /// back to when no token is available.
    async fn open_session(
        this: &Arc<Inner>,
        on_missing_credential: ConnectionState,
    ) -> RkResult<()> {
        let epoch = this.generation.load(Ordering::SeqCst);
        if !this.claim_connecting() {
            debug!("socket session already in progress");
            return Ok(());
        }

        let token = match this.credentials.auth_token().await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => {
                error!("no auth token available for socket connection");
                this.set_state(on_missing_credential);
                return Err(RkError::MissingCredential("no auth token".into()));
            }
            Err(e) => {
                error!("failed to read auth token: {e}");
                this.set_state(on_missing_credential);
                return Err(RkError::MissingCredential(e.to_string()));
            }
        };

        let url = match this.build_url(&token) {
            Ok(url) => url,
            Err(e) => {
                this.set_state(ConnectionState::Failed);
                return Err(e);
            }
        };

        // A disconnect during the credential lookup wins.
        let generation = epoch + 1;
        if this
            .generation
            .compare_exchange(epoch, generation, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("socket connect superseded before open");
            return Ok(());
        }

        let id = Uuid::new_v4();
        let mut session = lock(&this.session);
        let task = tokio::spawn(Inner::run_session(this.clone(), url, id, generation));
        *session = Some(ActiveSession {
            id,
            generation,
            outbound: None,
            task: Some(task),
            intentional_close: Arc::new(AtomicBool::new(false)),
        });
        debug!(session = %id, "socket session started");
        Ok(())
    }

    async fn run_session(this: Arc<Inner>, url: String, id: Uuid, generation: u64) {
        let Link {
            outbound,
            mut events,
        } = match this.connector.open(&url).await {
            Ok(link) => link,
            Err(e) => {
                warn!(session = %id, "socket open failed: {e}");
                Inner::on_close(&this, generation);
                return;
            }
        };

        if !this.on_open(generation, outbound) {
            debug!(session = %id, "dropping link of superseded session");
            return;
        }
        info!(session = %id, "socket connected");

        while let Some(event) = events.recv().await {
            match event {
                LinkEvent::Frame(text) => this.router.route_frame(&text),
                LinkEvent::Error(e) => warn!(session = %id, "socket error: {e}"),
                LinkEvent::Closed => break,
            }
        }

        info!(session = %id, "socket link closed");
        Inner::on_close(&this, generation);
    }

    fn on_open(&self, generation: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        let mut guard = lock(&self.session);
        let Some(session) = guard.as_mut() else {
            return false;
        };
        if session.generation != generation
            || self.generation.load(Ordering::SeqCst) != generation
            || session.intentional_close.load(Ordering::SeqCst)
        {
            return false;
        }
        session.outbound = Some(outbound);
        self.retry.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Open);
        true
    }

    fn on_close(this: &Arc<Inner>, generation: u64) {
        {
            let mut guard = lock(&this.session);
            match guard.as_mut() {
                Some(session) if session.generation == generation => {
                    if session.intentional_close.load(Ordering::SeqCst) {
                        return;
                    }
                    session.outbound = None;
                }
                _ => return,
            }
        }
        if this.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        Inner::attempt_reconnect(this);
    }

    fn attempt_reconnect(this: &Arc<Inner>) {
        if this.retry.load(Ordering::SeqCst) >= this.policy.max_attempts {
            error!(
                "socket reconnect attempts exhausted ({}), giving up",
                this.policy.max_attempts
            );
            this.set_state(ConnectionState::Failed);
            return;
        }

        let attempt = this.retry.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = this.policy.delay_for(attempt);
        this.set_state(ConnectionState::Reconnecting);
        warn!(
            "socket reconnect attempt {attempt}/{} in {:.1}s",
            this.policy.max_attempts,
            delay.as_secs_f64()
        );

        let generation = this.generation.load(Ordering::SeqCst);
        let inner = this.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Err(e) = Inner::open_session(&inner, ConnectionState::Failed).await {
                error!("socket reconnect attempt {attempt} aborted: {e}");
            }
        });
        *lock(&this.reconnect_task) = Some(handle);
    }
}
