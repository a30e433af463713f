//! Rentkar Services - the notification pipeline above the socket.
//!
//! - `aggregator`: badge counters merged from socket events, pushes and REST
//! - `provider`: mount/unmount lifecycle wiring everything together
//! - `push`: push token registration and push message delivery
//! - `presenter`: OS-level local notifications
//! - `event_bus`: application events for UI and navigation consumers

pub mod aggregator;
pub mod event_bus;
pub mod presenter;
pub mod provider;
pub mod push;

pub use aggregator::{CountsApi, NotificationAggregator, NotificationCounts};
pub use event_bus::{AppEvent, EventBus};
pub use presenter::{DesktopBackend, NotificationBackend, NotificationPresenter};
pub use provider::NotificationProvider;
pub use push::{
    AuthorizationStatus, PushBridge, PushMessage, PushMessaging, PushNotification,
    PushTokenRegistrar, Subscription, UnsupportedPushMessaging,
};
