//! Inbound message dispatch.
//!
//! Each message runs: ignore checks, prefix parse, lookup, permission
//! evaluation, context build, handler invocation. Messages are handled in
//! their own tasks, so two commands may interleave while awaiting I/O.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::commands::{CommandDescriptor, ExecutionContext, Registry, Responder};
use crate::error::{Error, Result};
use crate::permission::{self, Decision, DenyReason, Sender};
use crate::runtime::{Mode, SharedRuntime};
use crate::transport::{bare_id, is_group_chat, IncomingMessage, OutgoingContent, Transport, BROADCAST_CHAT};

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Broadcast, or not a command
    Ignored,
    /// Prefixed, but no command answers to the token
    Unmatched,
    Denied(DenyReason),
    Executed,
    Failed(String),
}

/// Split `body` into a lower-cased command token and its arguments.
///
/// The token must follow the prefix directly; `". ping"` is not a command.
pub fn parse_command(body: &str, prefix: &str) -> Option<(String, Vec<String>)> {
    if prefix.is_empty() {
        return None;
    }
    let rest = body.strip_prefix(prefix)?;
    if rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut parts = rest.split_whitespace();
    let name = parts.next()?.to_lowercase();
    let args = parts.map(str::to_string).collect();
    Some((name, args))
}

/// User-facing text for a denial.
pub fn deny_message(reason: DenyReason, mode: &Mode) -> &'static str {
    match reason {
        DenyReason::Blocked => "🚫 You are blocked from using this bot",
        DenyReason::OwnerOnly => "🔐 This command is restricted to the owner",
        DenyReason::ModeRestricted => match mode {
            Mode::Private => "🔒 Bot is Currently Private",
            Mode::InboxOnly => "📩 Bot Only Works in Private Chats",
            Mode::GroupsOnly => "👥 Bot Only Works in Groups",
            _ => "🚫 Command Not Allowed",
        },
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    runtime: SharedRuntime,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, runtime: SharedRuntime, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            runtime,
            transport,
        }
    }

    /// Consume messages until the channel closes, one task per message.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<IncomingMessage>) {
        tracing::info!("Dispatcher started with {} commands", self.registry.len());
        while let Some(message) = rx.recv().await {
            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move {
                dispatcher.handle(message).await;
            });
        }
        tracing::info!("Dispatcher stopped: message channel closed");
    }

    /// Process one message to completion.
    pub async fn handle(&self, message: IncomingMessage) -> Outcome {
        if message.chat == BROADCAST_CHAT || message.sender == BROADCAST_CHAT {
            return Outcome::Ignored;
        }

        let config = self.runtime.snapshot().await;
        let Some((name, args)) = parse_command(&message.body, &config.prefix) else {
            return Outcome::Ignored;
        };

        let Some(command) = self.registry.lookup(&name) else {
            tracing::debug!("No command for '{}{}'", config.prefix, name);
            return Outcome::Unmatched;
        };

        let sender_id = bare_id(&message.sender).to_string();
        let sender = Sender {
            id: &sender_id,
            is_group: message.is_group || is_group_chat(&message.chat),
            from_me: message.from_me,
        };

        if let Decision::Deny(reason) = permission::evaluate(&sender, &command, &config) {
            tracing::info!(
                "Denied {}{} for {} ({})",
                config.prefix,
                command.name,
                sender_id,
                reason
            );
            let text = deny_message(reason, &config.mode);
            if let Err(e) = self.transport.reply(&message, text).await {
                tracing::warn!("Failed to send denial to {}: {}", sender_id, e);
            }
            return Outcome::Denied(reason);
        }

        let flags = permission::classify(&sender, &config);
        let ctx = ExecutionContext::new(
            &message,
            &sender_id,
            &config.prefix,
            args,
            flags,
            self.runtime.clone(),
            Arc::clone(&self.registry),
            Responder::new(Arc::clone(&self.transport), message.clone()),
        );

        tracing::info!("Executing: {}{} from {}", config.prefix, command.name, message.chat);

        match self.invoke(&command, message, ctx).await {
            Ok(()) => Outcome::Executed,
            Err(e) => {
                tracing::error!("Message handler error: {}", e);
                self.notify_owner(&format!("⚠️ Error: {}", e)).await;
                Outcome::Failed(e.to_string())
            }
        }
    }

    /// Run the handler in its own task so a panic stays contained.
    async fn invoke(
        &self,
        command: &Arc<CommandDescriptor>,
        message: IncomingMessage,
        ctx: ExecutionContext,
    ) -> Result<()> {
        let handler = Arc::clone(&command.handler);
        let transport = Arc::clone(&self.transport);
        let task = tokio::spawn(async move { handler.handle(transport, &message, &ctx).await });

        match task.await {
            Ok(result) => result.map_err(|e| Error::Handler {
                command: command.name.clone(),
                message: e.to_string(),
            }),
            Err(join) => Err(Error::Handler {
                command: command.name.clone(),
                message: if join.is_panic() {
                    "handler panicked".to_string()
                } else {
                    "handler was cancelled".to_string()
                },
            }),
        }
    }

    /// Best-effort message to the owner's chat.
    pub async fn notify_owner(&self, text: &str) {
        let owner = self.runtime.snapshot().await.owner_chat();
        if let Err(e) = self
            .transport
            .send_message(&owner, &OutgoingContent::text(text))
            .await
        {
            tracing::warn!("Failed to notify owner: {}", e);
        }
    }
}
