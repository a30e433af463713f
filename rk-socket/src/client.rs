//! Application-facing socket handle.

use std::sync::Arc;

use tokio::sync::watch;

use rk_core::config::AppConfig;
use rk_core::error::RkResult;

use crate::connector::Connector;
use crate::frames::{BookingNotification, ChatMessage, OutboundFrame, TypingEvent};
use crate::registry::ListenerId;
use crate::router::{EventRouter, NotificationEvent};
use crate::transport::{
    ConnectionState, CredentialProvider, ReconnectPolicy, SessionTransport,
};

/// Cheaply cloneable handle over one transport and its router.
///
/// The application constructs one and hands clones to whoever needs it;
/// tests build isolated instances.
#[derive(Clone)]
pub struct SocketClient {
    transport: SessionTransport,
}

impl SocketClient {
    pub fn new(
        ws_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
    ) -> Self {
        let router = Arc::new(EventRouter::new());
        Self {
            transport: SessionTransport::with_policy(ws_url, credentials, connector, router, policy),
        }
    }

    /// Build from config: WebSocket URL for the configured environment and
    /// device, reconnect policy from `[socket]`.
    pub fn from_config(
        config: &AppConfig,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let url = config.server.effective_ws_url(config.device.os);
        Self::new(url, credentials, connector, ReconnectPolicy::from(&config.socket))
    }

    pub fn transport(&self) -> &SessionTransport {
        &self.transport
    }

    pub async fn connect(&self) -> RkResult<()> {
        self.transport.connect().await
    }

    pub fn disconnect(&self) {
        self.transport.disconnect()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.transport.state_receiver()
    }

    // --- Listeners ---

    pub fn on_message<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        self.transport.router().on_message(f)
    }

    pub fn off_message(&self, id: ListenerId) -> bool {
        self.transport.router().off_message(id)
    }

    pub fn on_typing<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&TypingEvent) + Send + Sync + 'static,
    {
        self.transport.router().on_typing(f)
    }

    pub fn off_typing(&self, id: ListenerId) -> bool {
        self.transport.router().off_typing(id)
    }

    pub fn on_notification<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.transport.router().on_notification(f)
    }

    pub fn off_notification(&self, id: ListenerId) -> bool {
        self.transport.router().off_notification(id)
    }

    pub fn on_booking_notification<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&BookingNotification) + Send + Sync + 'static,
    {
        self.transport.router().on_booking_notification(f)
    }

    pub fn off_booking_notification(&self, id: ListenerId) -> bool {
        self.transport.router().off_booking_notification(id)
    }

    // --- Senders (fire-and-forget) ---

    pub fn join_chat(&self, chat_id: &str) -> bool {
        self.transport.send(&OutboundFrame::JoinChat {
            chat_id: chat_id.to_string(),
        })
    }

    pub fn leave_chat(&self, chat_id: &str) -> bool {
        self.transport.send(&OutboundFrame::LeaveChat {
            chat_id: chat_id.to_string(),
        })
    }

    pub fn send_message(&self, chat_id: &str, content: &str) -> bool {
        self.transport.send(&OutboundFrame::SendMessage {
            chat_id: chat_id.to_string(),
            content: content.to_string(),
        })
    }

    pub fn send_typing(&self, chat_id: &str, is_typing: bool) -> bool {
        self.transport.send(&OutboundFrame::Typing {
            chat_id: chat_id.to_string(),
            is_typing,
        })
    }
}
