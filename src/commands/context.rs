//! Per-invocation execution context handed to command handlers.

use std::sync::Arc;

use super::Registry;
use crate::error::Result;
use crate::runtime::SharedRuntime;
use crate::transport::{IncomingMessage, QuotedMessage, Transport};

/// Reply/react capability scoped to the message that triggered a command.
#[derive(Clone)]
pub struct Responder {
    transport: Arc<dyn Transport>,
    message: IncomingMessage,
}

impl Responder {
    pub fn new(transport: Arc<dyn Transport>, message: IncomingMessage) -> Self {
        Self { transport, message }
    }

    pub async fn reply(&self, text: &str) -> Result<()> {
        self.transport.reply(&self.message, text).await
    }

    pub async fn react(&self, emoji: &str) -> Result<()> {
        self.transport.react(&self.message, emoji).await
    }
}

/// Built fresh for every dispatched command and dropped when the handler returns.
pub struct ExecutionContext {
    /// Sender id without the `@server` suffix
    pub sender: String,
    pub chat: String,
    pub push_name: Option<String>,
    pub body: String,
    pub args: Vec<String>,
    /// Args joined with single spaces
    pub text: String,
    /// Prefix in effect when the message was parsed
    pub prefix: String,
    pub quoted: Option<QuotedMessage>,
    pub is_owner: bool,
    pub is_self: bool,
    pub is_group: bool,
    pub is_allowed_sender: bool,
    pub runtime: SharedRuntime,
    pub registry: Arc<Registry>,
    responder: Responder,
}

impl ExecutionContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        message: &IncomingMessage,
        sender: &str,
        prefix: &str,
        args: Vec<String>,
        flags: ContextFlags,
        runtime: SharedRuntime,
        registry: Arc<Registry>,
        responder: Responder,
    ) -> Self {
        Self {
            sender: sender.to_string(),
            chat: message.chat.clone(),
            push_name: message.push_name.clone(),
            body: message.body.clone(),
            text: args.join(" "),
            args,
            prefix: prefix.to_string(),
            quoted: message.quoted.clone(),
            is_owner: flags.is_owner,
            is_self: flags.is_self,
            is_group: flags.is_group,
            is_allowed_sender: flags.is_allowed_sender,
            runtime,
            registry,
            responder,
        }
    }

    pub async fn reply(&self, text: &str) -> Result<()> {
        self.responder.reply(text).await
    }

    pub async fn react(&self, emoji: &str) -> Result<()> {
        self.responder.react(emoji).await
    }

    /// First argument, lower-cased.
    pub fn first_arg(&self) -> Option<String> {
        self.args.first().map(|a| a.to_lowercase())
    }
}

/// Identity flags computed by the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFlags {
    pub is_owner: bool,
    pub is_self: bool,
    pub is_group: bool,
    pub is_allowed_sender: bool,
}
