//! Push bridge: device token registration and push message delivery.
//!
//! The push SDK sits behind `PushMessaging`; backend registration behind
//! `PushTokenRegistrar` (implemented for `ApiClient`). The last registered
//! token is kept in the key-value store so re-registration is skipped
//! when nothing changed.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use rk_api::ApiClient;
use rk_core::config::DeviceConfig;
use rk_core::constants;
use rk_core::error::RkResult;
use rk_core::kv::KeyValueStore;
use rk_core::platform::DeviceOs;

use crate::event_bus::{AppEvent, EventBus};

/// Visible part of a push message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// A push message as delivered by the push SDK.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub notification: Option<PushNotification>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl PushMessage {
    pub fn title(&self) -> Option<&str> {
        self.notification.as_ref().and_then(|n| n.title.as_deref())
    }

    pub fn body(&self) -> Option<&str> {
        self.notification.as_ref().and_then(|n| n.body.as_deref())
    }
}

/// Messaging authorization as reported by the push SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Authorized,
    Provisional,
}

impl AuthorizationStatus {
    pub fn allows_notifications(&self) -> bool {
        matches!(self, Self::Authorized | Self::Provisional)
    }
}

/// Push SDK surface.
#[async_trait]
pub trait PushMessaging: Send + Sync {
    /// Ask for messaging authorization (iOS style prompt).
    async fn request_authorization(&self) -> RkResult<AuthorizationStatus>;

    /// Ask for the Android runtime notification permission.
    async fn request_runtime_permission(&self) -> RkResult<bool>;

    /// Current device push token.
    async fn token(&self) -> RkResult<Option<String>>;

    /// Message that cold-started the app, if any.
    async fn initial_notification(&self) -> RkResult<Option<PushMessage>>;

    fn subscribe_token_refresh(&self) -> broadcast::Receiver<String>;

    /// Messages received while the app is in the foreground.
    fn subscribe_foreground(&self) -> broadcast::Receiver<PushMessage>;

    /// Notifications the user tapped while the app was in the background.
    fn subscribe_opened(&self) -> broadcast::Receiver<PushMessage>;
}

/// Backend side of token registration.
#[async_trait]
pub trait PushTokenRegistrar: Send + Sync {
    async fn register_push_token(&self, token: &str) -> RkResult<()>;
}

#[async_trait]
impl PushTokenRegistrar for ApiClient {
    async fn register_push_token(&self, token: &str) -> RkResult<()> {
        self.register_fcm_token(token).await
    }
}

/// Stored registration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRegistration {
    pub fcm_token: String,
    pub registered_with_backend: bool,
}

impl PushRegistration {
    /// Parse a stored value. A bare token string (older format) counts as
    /// registered.
    fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| PushRegistration {
            fcm_token: raw.to_string(),
            registered_with_backend: true,
        })
    }
}

/// Detaches a push listener when dropped.
pub struct Subscription {
    name: &'static str,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    fn spawn(name: &'static str, task: JoinHandle<()>) -> Self {
        Self {
            name,
            task: Some(task),
        }
    }

    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("push {} listener detached", self.name);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

type BackgroundHandler = Arc<dyn Fn(&PushMessage) + Send + Sync>;

fn background_slot() -> &'static RwLock<Option<BackgroundHandler>> {
    static SLOT: OnceLock<RwLock<Option<BackgroundHandler>>> = OnceLock::new();
    SLOT.get_or_init(|| RwLock::new(None))
}

/// Register the process-wide handler for pushes delivered while the app is
/// in the background or not running. Replaces any previous handler.
pub fn set_background_message_handler<F>(handler: F)
where
    F: Fn(&PushMessage) + Send + Sync + 'static,
{
    let mut slot = background_slot()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = Some(Arc::new(handler));
}

/// Platform entry point for a background push. Returns whether a handler
/// ran to completion; a panicking handler is logged and reported as false.
pub fn dispatch_background_message(message: &PushMessage) -> bool {
    info!("background push message: {:?}", message.message_id);
    let handler = background_slot()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    match handler {
        Some(handler) => {
            if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                error!("background push handler panicked: {:?}", message.message_id);
                return false;
            }
            true
        }
        None => false,
    }
}

/// Token registration and push listener wiring.
pub struct PushBridge {
    messaging: Arc<dyn PushMessaging>,
    registrar: Arc<dyn PushTokenRegistrar>,
    store: Arc<dyn KeyValueStore>,
    device: DeviceConfig,
    event_bus: Option<EventBus>,
}

impl PushBridge {
    pub fn new(
        messaging: Arc<dyn PushMessaging>,
        registrar: Arc<dyn PushTokenRegistrar>,
        store: Arc<dyn KeyValueStore>,
        device: DeviceConfig,
    ) -> Self {
        Self {
            messaging,
            registrar,
            store,
            device,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Ask the user for notification permission where the platform needs
    /// it. Errors count as denied.
    pub async fn request_permission(&self) -> bool {
        let result = match self.device.os {
            DeviceOs::Android => {
                if self.device.os.requires_runtime_permission(self.device.os_version) {
                    self.messaging.request_runtime_permission().await
                } else {
                    // Granted at install time.
                    Ok(true)
                }
            }
            DeviceOs::Ios | DeviceOs::Desktop => self
                .messaging
                .request_authorization()
                .await
                .map(|status| status.allows_notifications()),
        };

        match result {
            Ok(granted) => granted,
            Err(e) => {
                error!("permission request error: {e}");
                false
            }
        }
    }

    /// The stored registration record, if any.
    pub fn stored_registration(&self) -> RkResult<Option<PushRegistration>> {
        Ok(self
            .store
            .get(constants::PUSH_TOKEN_KEY)?
            .map(|raw| PushRegistration::parse(&raw)))
    }

    fn has_auth_token(&self) -> RkResult<bool> {
        Ok(self
            .store
            .get(constants::AUTH_TOKEN_KEY)?
            .is_some_and(|t| !t.is_empty()))
    }

    /// Register the device push token with the backend. Idempotent: a
    /// token already registered is not posted again.
    pub async fn register_token(&self) -> bool {
        match self.try_register_token().await {
            Ok(registered) => registered,
            Err(e) => {
                error!("error registering push token: {e}");
                false
            }
        }
    }

    async fn try_register_token(&self) -> RkResult<bool> {
        if !self.request_permission().await {
            info!("notification permission denied");
            return Ok(false);
        }

        let Some(token) = self.messaging.token().await?.filter(|t| !t.is_empty()) else {
            warn!("failed to get push token");
            return Ok(false);
        };

        if let Some(stored) = self.stored_registration()? {
            if stored.fcm_token == token && stored.registered_with_backend {
                debug!("push token already registered");
                return Ok(true);
            }
        }

        if !self.has_auth_token()? {
            info!("user not logged in, skipping push token registration");
            return Ok(false);
        }

        self.register_with_backend(&token).await?;
        info!("push token registered");
        Ok(true)
    }

    /// Record the token as pending, POST it, then mark it registered. A
    /// failed POST leaves the pending record so the next attempt retries.
    async fn register_with_backend(&self, token: &str) -> RkResult<()> {
        self.store_registration(token, false)?;
        self.registrar.register_push_token(token).await?;
        self.store_registration(token, true)?;
        if let Some(bus) = &self.event_bus {
            bus.emit(AppEvent::PushTokenRegistered {
                token: token.to_string(),
            });
        }
        Ok(())
    }

    fn store_registration(&self, token: &str, registered_with_backend: bool) -> RkResult<()> {
        let record = PushRegistration {
            fcm_token: token.to_string(),
            registered_with_backend,
        };
        self.store
            .set(constants::PUSH_TOKEN_KEY, &serde_json::to_string(&record)?)
    }

    /// Re-register whenever the SDK rotates the token.
    pub fn setup_token_refresh_listener(self: &Arc<Self>) -> Subscription {
        let mut rx = self.messaging.subscribe_token_refresh();
        let bridge = self.clone();
        Subscription::spawn(
            "token-refresh",
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(token) => {
                            info!("push token refreshed");
                            if let Err(e) = bridge.on_token_refresh(&token).await {
                                error!("error updating refreshed push token: {e}");
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("missed {n} push token refreshes");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }),
        )
    }

    async fn on_token_refresh(&self, token: &str) -> RkResult<()> {
        if !self.has_auth_token()? {
            debug!("user not logged in, refreshed push token not registered");
            return Ok(());
        }
        self.register_with_backend(token).await
    }

    /// Invoke `callback` for every push received while in the foreground.
    /// Nothing is displayed here.
    pub fn setup_foreground_handler<F>(&self, callback: F) -> Subscription
    where
        F: Fn(PushMessage) + Send + Sync + 'static,
    {
        let rx = self.messaging.subscribe_foreground();
        Subscription::spawn("foreground", forward(rx, "foreground", callback))
    }

    /// Invoke `callback` when the user opens the app from a notification.
    pub fn setup_notification_opened_listener<F>(&self, callback: F) -> Subscription
    where
        F: Fn(PushMessage) + Send + Sync + 'static,
    {
        let rx = self.messaging.subscribe_opened();
        Subscription::spawn("opened", forward(rx, "opened", callback))
    }

    /// The push that cold-started the app, if any.
    pub async fn get_initial_notification(&self) -> Option<PushMessage> {
        match self.messaging.initial_notification().await {
            Ok(Some(message)) => {
                info!("app opened from notification: {:?}", message.message_id);
                Some(message)
            }
            Ok(None) => None,
            Err(e) => {
                error!("error getting initial notification: {e}");
                None
            }
        }
    }

    /// Forget the stored registration (logout).
    pub fn clear_token(&self) {
        if let Err(e) = self.store.remove(constants::PUSH_TOKEN_KEY) {
            error!("error clearing push token: {e}");
        }
    }
}

fn forward<F>(
    mut rx: broadcast::Receiver<PushMessage>,
    name: &'static str,
    callback: F,
) -> JoinHandle<()>
where
    F: Fn(PushMessage) + Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    debug!("{name} push message: {:?}", message.message_id);
                    callback(message);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("missed {n} {name} push messages");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Push SDK stand-in for hosts without push support (desktop, CLI).
/// Authorization is denied and no token is ever issued.
pub struct UnsupportedPushMessaging {
    tokens: broadcast::Sender<String>,
    messages: broadcast::Sender<PushMessage>,
}

impl Default for UnsupportedPushMessaging {
    fn default() -> Self {
        Self {
            tokens: broadcast::channel(1).0,
            messages: broadcast::channel(1).0,
        }
    }
}

#[async_trait]
impl PushMessaging for UnsupportedPushMessaging {
    async fn request_authorization(&self) -> RkResult<AuthorizationStatus> {
        Ok(AuthorizationStatus::Denied)
    }

    async fn request_runtime_permission(&self) -> RkResult<bool> {
        Ok(false)
    }

    async fn token(&self) -> RkResult<Option<String>> {
        Ok(None)
    }

    async fn initial_notification(&self) -> RkResult<Option<PushMessage>> {
        Ok(None)
    }

    fn subscribe_token_refresh(&self) -> broadcast::Receiver<String> {
        self.tokens.subscribe()
    }

    fn subscribe_foreground(&self) -> broadcast::Receiver<PushMessage> {
        self.messages.subscribe()
    }

    fn subscribe_opened(&self) -> broadcast::Receiver<PushMessage> {
        self.messages.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_push_message_shape() {
        let message: PushMessage = serde_json::from_str(
            r#"{"notification":{"title":"Booking Confirmed!","body":"See you"},"data":{"bookingId":"b1"}}"#,
        )
        .unwrap();
        assert_eq!(message.title(), Some("Booking Confirmed!"));
        assert_eq!(message.data.get("bookingId").map(String::as_str), Some("b1"));

        let bare: PushMessage = serde_json::from_str("{}").unwrap();
        assert_eq!(bare.title(), None);
    }

    #[test]
    fn test_registration_record_formats() {
        let record = PushRegistration::parse(r#"{"fcmToken":"t1","registeredWithBackend":false}"#);
        assert_eq!(record.fcm_token, "t1");
        assert!(!record.registered_with_backend);

        let legacy = PushRegistration::parse("raw-token");
        assert_eq!(legacy.fcm_token, "raw-token");
        assert!(legacy.registered_with_backend);
    }

    #[test]
    fn test_authorization_status() {
        assert!(AuthorizationStatus::Authorized.allows_notifications());
        assert!(AuthorizationStatus::Provisional.allows_notifications());
        assert!(!AuthorizationStatus::Denied.allows_notifications());
        assert!(!AuthorizationStatus::NotDetermined.allows_notifications());
    }

    #[test]
    fn test_background_handler() {
        let message = PushMessage {
            message_id: Some("bg-1".into()),
            ..PushMessage::default()
        };

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        set_background_message_handler(move |m| {
            sink.lock().unwrap().push(m.message_id.clone());
        });

        assert!(dispatch_background_message(&message));
        assert_eq!(*seen.lock().unwrap(), vec![Some("bg-1".to_string())]);

        // The handler slot is process-wide, so the panic case shares this test.
        set_background_message_handler(|_| panic!("handler blew up"));
        assert!(!dispatch_background_message(&message));
        assert!(!dispatch_background_message(&message));
    }
}
