//! Typed event bus for application-level notification events.
//!
//! Uses a tokio broadcast channel so UI and navigation consumers can follow
//! counter and connection changes without holding the aggregator.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::aggregator::NotificationCounts;
use crate::push::PushMessage;

/// Application events emitted by the notification pipeline.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Badge counters changed.
    CountsChanged(NotificationCounts),
    /// The socket went up or down.
    ConnectionChanged { connected: bool },
    /// The user opened the app from a notification while it was in the
    /// background.
    NotificationOpened(PushMessage),
    /// The app was cold-started from a notification.
    InitialNotification(PushMessage),
    /// A push token was registered with the backend.
    PushTokenRegistered { token: String },
}

/// Application-wide event bus backed by a tokio broadcast channel.
///
/// Every subscriber gets every event. Slow subscribers that fall behind
/// receive `Lagged` and miss events, which is fine for UI consumers.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(rk_core::constants::DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers. Having none is not an error.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => debug!("event_bus: emitted {label} to {count} subscriber(s)"),
            Err(_) => debug!("event_bus: no subscribers for {label}"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::CountsChanged(_) => "CountsChanged",
        AppEvent::ConnectionChanged { .. } => "ConnectionChanged",
        AppEvent::NotificationOpened(_) => "NotificationOpened",
        AppEvent::InitialNotification(_) => "InitialNotification",
        AppEvent::PushTokenRegistered { .. } => "PushTokenRegistered",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(AppEvent::ConnectionChanged { connected: true });

        match rx.recv().await.unwrap() {
            AppEvent::ConnectionChanged { connected } => assert!(connected),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(AppEvent::PushTokenRegistered { token: "t1".into() });

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                AppEvent::PushTokenRegistered { token } => assert_eq!(token, "t1"),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn test_no_subscribers() {
        let bus = EventBus::default();
        bus.emit(AppEvent::CountsChanged(NotificationCounts::default()));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
