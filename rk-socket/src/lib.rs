//! Rentkar Socket - realtime chat transport.
//!
//! This crate provides:
//! - A session transport that owns one WebSocket link at a time and
//!   reconnects with linear backoff after unexpected closes
//! - Decoding of inbound JSON frames into a closed event type
//! - Per-category listener registries with stable removal handles
//! - Typed outbound frames (join/leave room, send message, typing)
//! - A cloneable `SocketClient` facade tying it all together

pub mod client;
pub mod connector;
pub mod frames;
pub mod registry;
pub mod router;
pub mod transport;

pub use client::SocketClient;
pub use connector::{Connector, Link, LinkEvent, WsConnector};
pub use frames::{
    BookingAction, BookingNotification, ChatMessage, ChatNotification, InboundEvent,
    MessageSender, OutboundFrame, TypingEvent,
};
pub use registry::{ListenerId, ListenerRegistry};
pub use router::{EventRouter, NotificationEvent};
pub use transport::{
    ConnectionState, CredentialProvider, ReconnectPolicy, SessionTransport, StaticCredentials,
    StoredCredentials,
};
