//! HTTP client for a messaging bridge sidecar.
//!
//! The sidecar hosts the real chat sessions and exposes them under
//! `/sessions/{name}/...`. Inbound events come back to us through the
//! `/bridge/events` route of the web server.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{IncomingMessage, OutgoingContent, Transport, MAIN_SESSION};
use crate::error::{Error, Result};

/// Bridge connection settings shared by every session client.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub base_url: String,
    pub auth_path: PathBuf,
    pub headless: bool,
    /// Hand out separate short-lived sessions for web-driven logins.
    pub transient_sessions: bool,
}

pub struct BridgeTransport {
    client: Client,
    options: BridgeOptions,
    session: String,
}

#[derive(Serialize)]
struct StartRequest {
    auth_path: String,
    headless: bool,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    target: &'a str,
    #[serde(flatten)]
    content: &'a OutgoingContent,
}

#[derive(Serialize)]
struct ReplyRequest<'a> {
    chat: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct ReactRequest<'a> {
    chat: &'a str,
    emoji: &'a str,
}

#[derive(Serialize)]
struct PairingRequest<'a> {
    phone: &'a str,
}

#[derive(Deserialize)]
struct PairingResponse {
    code: String,
}

impl BridgeTransport {
    /// Client bound to the main session.
    pub fn new(options: BridgeOptions) -> Self {
        Self::for_session(options, MAIN_SESSION)
    }

    pub fn for_session(options: BridgeOptions, session: &str) -> Self {
        Self {
            client: Client::new(),
            options,
            session: session.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/sessions/{}/{}",
            self.options.base_url.trim_end_matches('/'),
            self.session,
            path
        )
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = self.url(path);
        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("{} returned HTTP {}: {}", url, status, text)));
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    fn session(&self) -> &str {
        &self.session
    }

    async fn initialize(&self) -> Result<()> {
        let request = StartRequest {
            auth_path: self.options.auth_path.display().to_string(),
            headless: self.options.headless,
        };
        self.post("start", &request).await?;
        tracing::info!("Bridge session '{}' starting", self.session);
        Ok(())
    }

    async fn send_message(&self, target: &str, content: &OutgoingContent) -> Result<()> {
        self.post("messages", &SendRequest { target, content }).await?;
        Ok(())
    }

    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<()> {
        let request = ReplyRequest {
            chat: &message.chat,
            text,
        };
        self.post(&format!("messages/{}/reply", message.id), &request)
            .await?;
        Ok(())
    }

    async fn react(&self, message: &IncomingMessage, emoji: &str) -> Result<()> {
        let request = ReactRequest {
            chat: &message.chat,
            emoji,
        };
        self.post(&format!("messages/{}/react", message.id), &request)
            .await?;
        Ok(())
    }

    async fn request_pairing_code(&self, phone: &str) -> Result<String> {
        let response = self.post("pairing-code", &PairingRequest { phone }).await?;
        let body: PairingResponse = response.json().await?;
        if body.code.trim().is_empty() {
            return Err(Error::Transport("bridge returned an empty pairing code".to_string()));
        }
        Ok(body.code)
    }

    async fn destroy(&self) -> Result<()> {
        self.post("destroy", &serde_json::json!({})).await?;
        tracing::info!("Bridge session '{}' destroyed", self.session);
        Ok(())
    }

    fn transient(&self) -> Option<Arc<dyn Transport>> {
        if !self.options.transient_sessions || self.session != MAIN_SESSION {
            return None;
        }
        let name = format!("web-{}", ulid::Ulid::new().to_string().to_lowercase());
        Some(Arc::new(Self::for_session(self.options.clone(), &name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(transient: bool) -> BridgeOptions {
        BridgeOptions {
            base_url: "http://127.0.0.1:8088/".to_string(),
            auth_path: PathBuf::from("./auth"),
            headless: true,
            transient_sessions: transient,
        }
    }

    #[test]
    fn test_session_urls() {
        let bridge = BridgeTransport::new(options(false));
        assert_eq!(
            bridge.url("messages"),
            "http://127.0.0.1:8088/sessions/main/messages"
        );
    }

    #[test]
    fn test_transient_sessions() {
        assert!(BridgeTransport::new(options(false)).transient().is_none());

        let bridge = BridgeTransport::new(options(true));
        let web = bridge.transient().unwrap();
        assert!(web.session().starts_with("web-"));
        // A transient session never spawns further sessions.
        assert!(web.transient().is_none());
    }

    #[test]
    fn test_send_request_shape() {
        let content = OutgoingContent {
            text: "hi".to_string(),
            media_url: Some("https://example.com/a.png".to_string()),
        };
        let value = serde_json::to_value(SendRequest {
            target: "1@c.us",
            content: &content,
        })
        .unwrap();
        assert_eq!(value["target"], "1@c.us");
        assert_eq!(value["text"], "hi");
        assert_eq!(value["media_url"], "https://example.com/a.png");
    }
}
