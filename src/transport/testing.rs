//! In-memory transport that records every call.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{IncomingMessage, OutgoingContent, Transport};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Initialize,
    Send { target: String, text: String },
    Reply { message_id: String, text: String },
    React { message_id: String, emoji: String },
    PairingCode { phone: String },
    Destroy,
}

pub struct RecordingTransport {
    session: String,
    calls: Mutex<Vec<Call>>,
    pairing: Mutex<std::result::Result<String, String>>,
    initialize: Mutex<Option<String>>,
    transient: Option<Arc<RecordingTransport>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::named("main")
    }

    pub fn named(session: &str) -> Self {
        Self {
            session: session.to_string(),
            calls: Mutex::new(Vec::new()),
            pairing: Mutex::new(Ok("ABCD1234".to_string())),
            initialize: Mutex::new(None),
            transient: None,
        }
    }

    /// Main session that hands out `web` as its transient session.
    pub fn with_transient(web: Arc<RecordingTransport>) -> Self {
        let mut transport = Self::new();
        transport.transient = Some(web);
        transport
    }

    pub fn fail_pairing(&self, reason: &str) {
        *self.pairing.lock().unwrap() = Err(reason.to_string());
    }

    pub fn succeed_pairing(&self, code: &str) {
        *self.pairing.lock().unwrap() = Ok(code.to_string());
    }

    /// Make every later `initialize` fail with `reason`.
    pub fn fail_initialize(&self, reason: &str) {
        *self.initialize.lock().unwrap() = Some(reason.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Reply { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { target, text } => Some((target, text)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn session(&self) -> &str {
        &self.session
    }

    async fn initialize(&self) -> Result<()> {
        self.record(Call::Initialize);
        match self.initialize.lock().unwrap().clone() {
            Some(reason) => Err(Error::Transport(reason)),
            None => Ok(()),
        }
    }

    async fn send_message(&self, target: &str, content: &OutgoingContent) -> Result<()> {
        self.record(Call::Send {
            target: target.to_string(),
            text: content.text.clone(),
        });
        Ok(())
    }

    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<()> {
        self.record(Call::Reply {
            message_id: message.id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn react(&self, message: &IncomingMessage, emoji: &str) -> Result<()> {
        self.record(Call::React {
            message_id: message.id.clone(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn request_pairing_code(&self, phone: &str) -> Result<String> {
        self.record(Call::PairingCode {
            phone: phone.to_string(),
        });
        self.pairing
            .lock()
            .unwrap()
            .clone()
            .map_err(Error::Transport)
    }

    async fn destroy(&self) -> Result<()> {
        self.record(Call::Destroy);
        Ok(())
    }

    fn transient(&self) -> Option<Arc<dyn Transport>> {
        self.transient
            .clone()
            .map(|t| t as Arc<dyn Transport>)
    }
}

/// Incoming direct message from `sender` (bare number).
pub fn direct_message(sender: &str, body: &str) -> IncomingMessage {
    IncomingMessage {
        id: ulid::Ulid::new().to_string(),
        chat: format!("{}@c.us", sender),
        sender: format!("{}@c.us", sender),
        body: body.to_string(),
        is_group: false,
        from_me: false,
        quoted: None,
        push_name: None,
    }
}

/// Incoming group message from `sender` (bare number).
pub fn group_message(sender: &str, body: &str) -> IncomingMessage {
    IncomingMessage {
        chat: "120363000000000000@g.us".to_string(),
        is_group: true,
        ..direct_message(sender, body)
    }
}
