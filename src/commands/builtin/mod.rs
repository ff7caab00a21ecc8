//! Built-in commands.

mod admin;
mod help;
mod ping;
mod uptime;

use std::time::Instant;

use super::{CollisionPolicy, CommandDescriptor, Registry};
use crate::error::Result;

pub use admin::{ModeCommand, PrefixCommand};
pub use help::HelpCommand;
pub use ping::PingCommand;
pub use uptime::{format_uptime, UptimeCommand};

/// Descriptors for every built-in command, in registration order.
pub fn descriptors(started: Instant) -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor::new("ping", PingCommand)
            .alias("speed")
            .category("general")
            .description("Check Bot's Response Speed."),
        CommandDescriptor::new("uptime", UptimeCommand::new(started))
            .alias("runtime")
            .category("general")
            .description("Check Bot's Server Runtime."),
        CommandDescriptor::new("help", HelpCommand)
            .alias("menu")
            .category("general")
            .description("List available commands."),
        CommandDescriptor::new("prefix", PrefixCommand)
            .owner_only()
            .category("owner")
            .description("Change command prefix")
            .usage("prefix <new_prefix>"),
        CommandDescriptor::new("mode", ModeCommand)
            .owner_only()
            .category("owner")
            .description("Change bot mode")
            .usage("mode <public|private|inbox-only|groups-only>"),
    ]
}

/// Build the registry with all built-in commands.
pub fn load(policy: CollisionPolicy, started: Instant) -> Result<Registry> {
    let mut registry = Registry::with_policy(policy);
    for descriptor in descriptors(started) {
        registry.register(descriptor)?;
    }
    tracing::info!("Plugins loaded: {}", registry.len());
    Ok(registry)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::commands::{ContextFlags, ExecutionContext, Registry, Responder};
    use crate::dispatch::parse_command;
    use crate::runtime::SharedRuntime;
    use crate::transport::testing::RecordingTransport;
    use crate::transport::{IncomingMessage, Transport};

    /// Context for `message` as the dispatcher would build it for the owner.
    pub async fn owner_context(
        message: &IncomingMessage,
        runtime: &SharedRuntime,
        registry: Arc<Registry>,
        transport: &Arc<RecordingTransport>,
    ) -> ExecutionContext {
        let prefix = runtime.prefix().await;
        let (_, args) = parse_command(&message.body, &prefix).unwrap();
        let transport: Arc<dyn Transport> = Arc::clone(transport) as Arc<dyn Transport>;
        ExecutionContext::new(
            message,
            "owner",
            &prefix,
            args,
            ContextFlags {
                is_owner: true,
                ..Default::default()
            },
            runtime.clone(),
            registry,
            Responder::new(transport, message.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_load_without_collisions() {
        let registry = load(CollisionPolicy::Reject, Instant::now()).unwrap();
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.lookup("speed").unwrap().name, "ping");
        assert_eq!(registry.lookup("menu").unwrap().name, "help");
        assert!(registry.lookup("mode").unwrap().restricted_to_owner);
        assert!(registry.lookup("prefix").unwrap().restricted_to_owner);
        assert!(!registry.lookup("uptime").unwrap().restricted_to_owner);
    }
}
