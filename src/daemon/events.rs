//! Routes bridge events to the dispatcher and the arbiter.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::auth::Arbiter;
use crate::runtime::SharedRuntime;
use crate::transport::{IncomingMessage, OutgoingContent, SessionEvent, TransportEvent};

pub struct EventRouter {
    arbiter: Arc<Arbiter>,
    messages: mpsc::Sender<IncomingMessage>,
    runtime: SharedRuntime,
}

impl EventRouter {
    pub fn new(
        arbiter: Arc<Arbiter>,
        messages: mpsc::Sender<IncomingMessage>,
        runtime: SharedRuntime,
    ) -> Self {
        Self {
            arbiter,
            messages,
            runtime,
        }
    }

    /// Consume events until every sender is gone.
    pub async fn run(self, mut rx: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = rx.recv().await {
            self.route(event).await;
        }
        tracing::debug!("Event router stopped");
    }

    pub async fn route(&self, SessionEvent { session, event }: SessionEvent) {
        match event {
            TransportEvent::Message(message) => {
                if session != self.arbiter.main_session() {
                    tracing::debug!("Dropping message from login session '{}'", session);
                    return;
                }
                if self.messages.send(message).await.is_err() {
                    tracing::warn!("Dispatcher is gone; message dropped");
                }
            }
            other => {
                let was_ready = self.arbiter.is_ready();
                self.arbiter.handle_event(&session, &other).await;
                if !was_ready && self.arbiter.is_ready() {
                    self.announce_online().await;
                }
            }
        }
    }

    async fn announce_online(&self) {
        let config = self.runtime.snapshot().await;
        tracing::info!(
            "🚀 Bot is Online! Prefix: {} Mode: {}",
            config.prefix,
            config.mode
        );

        let text = format!(
            "🤖 Bot is online!\nPrefix: {}\nMode: {}",
            config.prefix, config.mode
        );
        if let Err(e) = self
            .arbiter
            .send(&config.owner_chat(), &OutgoingContent::text(text))
            .await
        {
            tracing::warn!("Failed to notify owner: {}", e);
        }
    }
}
