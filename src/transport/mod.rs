//! Messaging transport contract.
//!
//! The transport owns the real chat session (browser automation, protocol,
//! credential storage). We only consume its events and call the handful of
//! operations below.

pub mod bridge;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use bridge::BridgeTransport;

/// Chat id of the status broadcast feed. Never dispatched.
pub const BROADCAST_CHAT: &str = "status@broadcast";

/// Session name of the long-lived session the dispatcher runs on.
pub const MAIN_SESSION: &str = "main";

/// Strip the `@server` suffix from a chat or user id.
pub fn bare_id(id: &str) -> &str {
    id.split('@').next().unwrap_or(id)
}

/// Whether a chat id names a group conversation.
pub fn is_group_chat(chat: &str) -> bool {
    chat.ends_with("@g.us")
}

/// A message quoted by the triggering message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotedMessage {
    pub id: String,
    pub sender: String,
    #[serde(default)]
    pub body: String,
}

/// Inbound chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Transport message id
    pub id: String,

    /// Chat the message arrived in
    pub chat: String,

    /// Author id; equals `chat` in direct conversations
    pub sender: String,

    pub body: String,

    #[serde(default)]
    pub is_group: bool,

    #[serde(default)]
    pub from_me: bool,

    #[serde(default)]
    pub quoted: Option<QuotedMessage>,

    /// Display name of the author, if the transport knows it
    #[serde(default)]
    pub push_name: Option<String>,
}

/// Events emitted by a transport session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
    Message(IncomingMessage),
    QrCode { payload: String },
    Authenticated,
    AuthFailure { reason: String },
    Ready,
    Disconnected {
        #[serde(default)]
        reason: String,
    },
}

/// A transport event tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(default = "default_session")]
    pub session: String,
    #[serde(flatten)]
    pub event: TransportEvent,
}

fn default_session() -> String {
    MAIN_SESSION.to_string()
}

/// Outgoing message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

impl OutgoingContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media_url: None,
        }
    }
}

/// Operations exposed by a messaging session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Session name this client is bound to.
    fn session(&self) -> &str;

    /// Start (or resume) the session. Emits `qr_code` events while no
    /// credentials are stored.
    async fn initialize(&self) -> Result<()>;

    async fn send_message(&self, target: &str, content: &OutgoingContent) -> Result<()>;

    /// Reply to `message` in its chat, quoting it.
    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<()>;

    async fn react(&self, message: &IncomingMessage, emoji: &str) -> Result<()>;

    async fn request_pairing_code(&self, phone: &str) -> Result<String>;

    async fn destroy(&self) -> Result<()>;

    /// A fresh, short-lived session sharing this transport's credential
    /// store, used for web-driven logins. `None` means logins run on this
    /// session directly.
    fn transient(&self) -> Option<Arc<dyn Transport>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_id() {
        assert_eq!(bare_id("254700000000@c.us"), "254700000000");
        assert_eq!(bare_id("254700000000"), "254700000000");
        assert!(is_group_chat("12345-678@g.us"));
        assert!(!is_group_chat("12345@c.us"));
    }

    #[test]
    fn test_session_event_json() {
        let event: SessionEvent =
            serde_json::from_str(r#"{"type":"qr_code","payload":"abc"}"#).unwrap();
        assert_eq!(event.session, MAIN_SESSION);
        assert_eq!(
            event.event,
            TransportEvent::QrCode {
                payload: "abc".to_string()
            }
        );

        let event: SessionEvent = serde_json::from_str(
            r#"{"session":"web-1","type":"message","id":"m1","chat":"1@c.us","sender":"1@c.us","body":".ping"}"#,
        )
        .unwrap();
        assert_eq!(event.session, "web-1");
        match event.event {
            TransportEvent::Message(msg) => {
                assert_eq!(msg.body, ".ping");
                assert!(!msg.is_group);
                assert!(msg.quoted.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
