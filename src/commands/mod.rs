//! Chat commands: descriptors, registry and execution context.

pub mod builtin;
pub mod context;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::transport::{IncomingMessage, Transport};

pub use context::{ContextFlags, ExecutionContext, Responder};
pub use registry::{CollisionPolicy, Registry};

/// Handler contract every command satisfies.
///
/// The context is only valid for the duration of the call.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        transport: Arc<dyn Transport>,
        message: &IncomingMessage,
        ctx: &ExecutionContext,
    ) -> Result<()>;
}

/// Registered unit binding a trigger name and aliases to a handler.
#[derive(Clone)]
pub struct CommandDescriptor {
    /// Lower-cased trigger name
    pub name: String,
    /// Lower-cased alternate triggers
    pub aliases: Vec<String>,
    pub restricted_to_owner: bool,
    pub category: String,
    pub description: String,
    pub usage: Option<String>,
    /// Left out of the `help` listing
    pub hidden: bool,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandDescriptor {
    pub fn new(name: &str, handler: impl CommandHandler + 'static) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            aliases: Vec::new(),
            restricted_to_owner: false,
            category: "general".to_string(),
            description: String::new(),
            usage: None,
            hidden: false,
            handler: Arc::new(handler),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        let alias = alias.trim().to_lowercase();
        if alias != self.name && !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.restricted_to_owner = true;
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn usage(mut self, usage: &str) -> Self {
        self.usage = Some(usage.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Name followed by aliases.
    pub fn triggers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn answers_to(&self, token: &str) -> bool {
        self.triggers().any(|t| t == token)
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("restricted_to_owner", &self.restricted_to_owner)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}
