//! Wire frames exchanged with the chat server.
//!
//! Every frame is a JSON text object discriminated by its `type` field.
//! Inbound frames decode into the closed `InboundEvent` enum; anything with
//! an unrecognised `type` is dropped by `decode_frame`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use rk_core::error::{RkError, RkResult};

/// Events the server pushes over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A message posted in a room this client joined.
    NewMessage { message: ChatMessage },
    /// Typing indicator from another participant.
    UserTyping(TypingEvent),
    /// A chat message arrived for this user outside an open room.
    NewChatNotification(ChatNotification),
    /// A booking involving this user changed.
    BookingNotification(BookingNotification),
}

impl InboundEvent {
    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::NewMessage { .. } => "new_message",
            InboundEvent::UserTyping(_) => "user_typing",
            InboundEvent::NewChatNotification(_) => "new_chat_notification",
            InboundEvent::BookingNotification(_) => "booking_notification",
        }
    }
}

const KNOWN_TYPES: &[&str] = &[
    "new_message",
    "user_typing",
    "new_chat_notification",
    "booking_notification",
];

/// A chat message document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<MessageSender>,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Populated sender profile attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSender {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub chat_id: String,
    pub user_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatNotification {
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingNotification {
    pub action: BookingAction,
    #[serde(default)]
    pub item_title: Option<String>,
    #[serde(default)]
    pub booking_id: Option<String>,
}

/// What happened to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    NewRequest,
    Confirmed,
    Rejected,
    Cancelled,
    /// Any action this client does not know about.
    #[serde(other)]
    Other,
}

/// Decode one text frame.
///
/// Returns `Ok(None)` for well-formed JSON whose `type` is unknown, and an
/// error for malformed JSON or a known type with an invalid payload.
pub fn decode_frame(text: &str) -> RkResult<Option<InboundEvent>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| RkError::Serialization(format!("socket frame parse error: {e}")))?;

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        debug!("ignoring socket frame of unknown type {kind:?}");
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| RkError::Serialization(format!("invalid {kind} frame: {e}")))
}

/// Frames this client sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    #[serde(rename_all = "camelCase")]
    JoinChat { chat_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveChat { chat_id: String },
    #[serde(rename_all = "camelCase")]
    SendMessage { chat_id: String, content: String },
    #[serde(rename_all = "camelCase")]
    Typing { chat_id: String, is_typing: bool },
}

impl OutboundFrame {
    /// Serialize to the JSON text sent over the link.
    pub fn to_text(&self) -> RkResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
