//! Local (OS-level) notifications.
//!
//! Presentation is best effort: failures are logged and reported as
//! `false`, never propagated. The platform surface sits behind
//! `NotificationBackend`; `DesktopBackend` renders through notify-rust.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use rk_core::config::PushConfig;
use rk_core::constants;
use rk_core::error::{RkError, RkResult};
use rk_core::platform::DeviceOs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importance {
    Default,
    High,
}

/// Android notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub importance: Importance,
    pub sound: String,
    pub vibration: bool,
}

impl NotificationChannel {
    pub fn from_config(config: &PushConfig) -> Self {
        Self {
            id: config.channel_id.clone(),
            name: config.channel_name.clone(),
            importance: Importance::High,
            sound: "default".into(),
            vibration: true,
        }
    }
}

/// Per-platform presentation options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformOptions {
    Android {
        channel_id: String,
        importance: Importance,
        press_action: String,
        sound: String,
    },
    Ios {
        sound: String,
    },
    Desktop,
}

/// A fully built notification ready for the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNotification {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
    pub options: PlatformOptions,
}

/// OS notification surface.
///
/// `display` is called from the provider's pump task and must not block;
/// backends that talk to a slow OS service hand the work off.
pub trait NotificationBackend: Send + Sync {
    fn create_channel(&self, channel: &NotificationChannel) -> RkResult<()>;
    fn display(&self, notification: &LocalNotification) -> RkResult<()>;
}

/// Native desktop notifications via notify-rust. The D-Bus round trip runs
/// on the blocking pool when a tokio runtime is available, so errors from
/// that path are only logged.
#[derive(Debug, Clone, Default)]
pub struct DesktopBackend;

impl NotificationBackend for DesktopBackend {
    fn create_channel(&self, channel: &NotificationChannel) -> RkResult<()> {
        debug!("desktop notifications have no channels, ignoring {}", channel.id);
        Ok(())
    }

    fn display(&self, notification: &LocalNotification) -> RkResult<()> {
        let mut toast = notify_rust::Notification::new();
        toast
            .summary(&notification.title)
            .body(&notification.body)
            .appname(constants::APP_NAME);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    if let Err(e) = toast.show() {
                        error!("error showing desktop notification: {e}");
                    }
                });
                Ok(())
            }
            Err(_) => toast
                .show()
                .map(|_| ())
                .map_err(|e| RkError::Notification(e.to_string())),
        }
    }
}

/// Builds platform-specific notifications and hands them to the backend.
pub struct NotificationPresenter {
    backend: Arc<dyn NotificationBackend>,
    os: DeviceOs,
    channel: NotificationChannel,
    enabled: bool,
}

impl NotificationPresenter {
    pub fn new(backend: Arc<dyn NotificationBackend>, os: DeviceOs, config: &PushConfig) -> Self {
        Self {
            backend,
            os,
            channel: NotificationChannel::from_config(config),
            enabled: config.enabled,
        }
    }

    pub fn channel(&self) -> &NotificationChannel {
        &self.channel
    }

    /// Create the notification channel where the platform needs one. A
    /// no-op returning `true` elsewhere.
    pub fn create_channel(&self) -> bool {
        if !self.os.requires_notification_channel() {
            return true;
        }
        match self.backend.create_channel(&self.channel) {
            Ok(()) => {
                info!("notification channel {:?} ready", self.channel.id);
                true
            }
            Err(e) => {
                error!("failed to create notification channel: {e}");
                false
            }
        }
    }

    /// Build the notification for this platform without displaying it.
    pub fn build(&self, title: &str, body: &str, data: HashMap<String, String>) -> LocalNotification {
        let options = match self.os {
            DeviceOs::Android => PlatformOptions::Android {
                channel_id: self.channel.id.clone(),
                importance: Importance::High,
                press_action: "default".into(),
                sound: "default".into(),
            },
            DeviceOs::Ios => PlatformOptions::Ios {
                sound: "default".into(),
            },
            DeviceOs::Desktop => PlatformOptions::Desktop,
        };
        LocalNotification {
            title: title.to_string(),
            body: body.to_string(),
            data,
            options,
        }
    }

    /// Show a notification in the system tray. Returns whether it was
    /// handed to the OS.
    pub fn display_local_notification(
        &self,
        title: &str,
        body: &str,
        data: HashMap<String, String>,
    ) -> bool {
        if !self.enabled {
            debug!("local notifications disabled, skipping {title:?}");
            return false;
        }
        let notification = self.build(title, body, data);
        match self.backend.display(&notification) {
            Ok(()) => {
                debug!("displayed notification {title:?}");
                true
            }
            Err(e) => {
                error!("error displaying notification: {e}");
                false
            }
        }
    }
}

/// Flatten a payload into the string map notifications carry, tagged with
/// its event `kind`. Nulls are dropped; non-string values are JSON-encoded.
pub fn notification_data<T: Serialize>(kind: &str, payload: &T) -> HashMap<String, String> {
    let mut data = HashMap::new();
    if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(payload) {
        for (key, value) in map {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => {
                    data.insert(key, s);
                }
                other => {
                    data.insert(key, other.to_string());
                }
            }
        }
    }
    data.insert("type".into(), kind.to_string());
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        channels: Mutex<Vec<NotificationChannel>>,
        shown: Mutex<Vec<LocalNotification>>,
        fail: bool,
    }

    impl NotificationBackend for Recorder {
        fn create_channel(&self, channel: &NotificationChannel) -> RkResult<()> {
            self.channels.lock().unwrap().push(channel.clone());
            Ok(())
        }

        fn display(&self, notification: &LocalNotification) -> RkResult<()> {
            if self.fail {
                return Err(RkError::Notification("no display".into()));
            }
            self.shown.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    #[test]
    fn test_channel_only_on_android() {
        let backend = Arc::new(Recorder::default());
        let config = PushConfig::default();

        assert!(NotificationPresenter::new(backend.clone(), DeviceOs::Ios, &config).create_channel());
        assert!(backend.channels.lock().unwrap().is_empty());

        assert!(NotificationPresenter::new(backend.clone(), DeviceOs::Android, &config).create_channel());
        let channels = backend.channels.lock().unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id, "default");
        assert_eq!(channels[0].name, "Default Channel");
        assert_eq!(channels[0].importance, Importance::High);
        assert!(channels[0].vibration);
    }

    #[test]
    fn test_android_options() {
        let backend = Arc::new(Recorder::default());
        let presenter = NotificationPresenter::new(backend.clone(), DeviceOs::Android, &PushConfig::default());

        assert!(presenter.display_local_notification("Hi", "There", HashMap::new()));
        let shown = backend.shown.lock().unwrap();
        assert_eq!(
            shown[0].options,
            PlatformOptions::Android {
                channel_id: "default".into(),
                importance: Importance::High,
                press_action: "default".into(),
                sound: "default".into(),
            }
        );
    }

    #[test]
    fn test_failure_is_swallowed() {
        let backend = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let presenter = NotificationPresenter::new(backend, DeviceOs::Ios, &PushConfig::default());
        assert!(!presenter.display_local_notification("Hi", "There", HashMap::new()));
    }

    #[test]
    fn test_disabled_presenter_skips_backend() {
        let backend = Arc::new(Recorder::default());
        let config = PushConfig {
            enabled: false,
            ..PushConfig::default()
        };
        let presenter = NotificationPresenter::new(backend.clone(), DeviceOs::Ios, &config);
        assert!(!presenter.display_local_notification("Hi", "There", HashMap::new()));
        assert!(backend.shown.lock().unwrap().is_empty());
    }

    #[test]
    fn test_notification_data_flattening() {
        let payload = serde_json::json!({"chatId": "c1", "unread": 3, "senderName": null});
        let data = notification_data("new_chat_notification", &payload);
        assert_eq!(data.get("chatId").map(String::as_str), Some("c1"));
        assert_eq!(data.get("unread").map(String::as_str), Some("3"));
        assert_eq!(data.get("type").map(String::as_str), Some("new_chat_notification"));
        assert!(!data.contains_key("senderName"));
    }
}
