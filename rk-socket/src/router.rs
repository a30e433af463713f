//! Fan-out of decoded inbound events to registered listeners.

use tracing::{debug, warn};

use crate::frames::{self, BookingNotification, ChatMessage, ChatNotification, InboundEvent, TypingEvent};
use crate::registry::{ListenerId, ListenerRegistry};

/// Payload delivered to `notification` listeners: both chat and booking
/// notifications flow through this category.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Chat(ChatNotification),
    Booking(BookingNotification),
}

/// Routes inbound events by category.
pub struct EventRouter {
    message: ListenerRegistry<ChatMessage>,
    typing: ListenerRegistry<TypingEvent>,
    notification: ListenerRegistry<NotificationEvent>,
    booking: ListenerRegistry<BookingNotification>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            message: ListenerRegistry::new("message"),
            typing: ListenerRegistry::new("typing"),
            notification: ListenerRegistry::new("notification"),
            booking: ListenerRegistry::new("bookingNotification"),
        }
    }

    pub fn on_message<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        self.message.add(f)
    }

    pub fn off_message(&self, id: ListenerId) -> bool {
        self.message.remove(id)
    }

    pub fn on_typing<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&TypingEvent) + Send + Sync + 'static,
    {
        self.typing.add(f)
    }

    pub fn off_typing(&self, id: ListenerId) -> bool {
        self.typing.remove(id)
    }

    pub fn on_notification<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.notification.add(f)
    }

    pub fn off_notification(&self, id: ListenerId) -> bool {
        self.notification.remove(id)
    }

    pub fn on_booking_notification<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&BookingNotification) + Send + Sync + 'static,
    {
        self.booking.add(f)
    }

    pub fn off_booking_notification(&self, id: ListenerId) -> bool {
        self.booking.remove(id)
    }

    /// Decode a raw text frame and dispatch it. Malformed frames are logged
    /// and discarded.
    pub fn route_frame(&self, text: &str) {
        match frames::decode_frame(text) {
            Ok(Some(event)) => self.dispatch(&event),
            Ok(None) => {}
            Err(e) => warn!("discarding socket frame: {e}"),
        }
    }

    /// Dispatch an already decoded event.
    ///
    /// Booking notifications reach the booking listeners first, then the
    /// general notification listeners.
    pub fn dispatch(&self, event: &InboundEvent) {
        debug!("socket event: {}", event.kind());
        match event {
            InboundEvent::NewMessage { message } => self.message.dispatch(message),
            InboundEvent::UserTyping(typing) => self.typing.dispatch(typing),
            InboundEvent::NewChatNotification(chat) => {
                self.notification
                    .dispatch(&NotificationEvent::Chat(chat.clone()));
            }
            InboundEvent::BookingNotification(booking) => {
                self.booking.dispatch(booking);
                self.notification
                    .dispatch(&NotificationEvent::Booking(booking.clone()));
            }
        }
    }

    /// Drop every registered listener in every category.
    pub fn clear_all(&self) {
        self.message.clear();
        self.typing.clear();
        self.notification.clear();
        self.booking.clear();
    }

    /// Total listeners across all categories.
    pub fn listener_count(&self) -> usize {
        self.message.len() + self.typing.len() + self.notification.len() + self.booking.len()
    }
}
