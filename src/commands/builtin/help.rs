//! `help`: list visible commands by category.

use std::sync::Arc;

use async_trait::async_trait;

use crate::commands::{CommandHandler, ExecutionContext, Registry};
use crate::error::Result;
use crate::transport::{IncomingMessage, Transport};

pub struct HelpCommand;

/// Render the command menu for `prefix`. Owner-only commands are listed
/// only when `include_owner` is set.
pub fn render_menu(registry: &Registry, prefix: &str, include_owner: bool) -> String {
    let mut out = String::from("*Commands*\n");
    for (category, commands) in registry.by_category() {
        let visible: Vec<_> = commands
            .into_iter()
            .filter(|c| include_owner || !c.restricted_to_owner)
            .collect();
        if visible.is_empty() {
            continue;
        }

        out.push_str(&format!("\n*{}*\n", category.to_uppercase()));
        for command in visible {
            out.push_str(&format!("• {}{}", prefix, command.name));
            if !command.aliases.is_empty() {
                out.push_str(&format!(" ({})", command.aliases.join(", ")));
            }
            if !command.description.is_empty() {
                out.push_str(&format!(" - {}", command.description));
            }
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn handle(
        &self,
        _transport: Arc<dyn Transport>,
        _message: &IncomingMessage,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        let include_owner = ctx.is_owner || ctx.is_self;
        ctx.reply(&render_menu(&ctx.registry, &ctx.prefix, include_owner))
            .await
    }
}
