//! Append-only command table.
//!
//! Populated once while plugins load, then frozen behind an `Arc` and read
//! concurrently by the dispatcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::CommandDescriptor;
use crate::error::{Error, Result};

/// What `register` does when a trigger is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Refuse the new descriptor.
    #[default]
    Reject,
    /// Drop the earlier descriptor(s) with a warning; last registration wins.
    Replace,
}

#[derive(Debug, Default)]
pub struct Registry {
    commands: Vec<Arc<CommandDescriptor>>,
    policy: CollisionPolicy,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: CollisionPolicy) -> Self {
        Self {
            commands: Vec::new(),
            policy,
        }
    }

    /// Add a descriptor.
    ///
    /// With `Reject` a collision on the name or any alias fails with
    /// `DuplicateName` and leaves the table unchanged.
    pub fn register(&mut self, descriptor: CommandDescriptor) -> Result<()> {
        if descriptor.name.is_empty() {
            return Err(Error::Validation("command name must not be empty".to_string()));
        }

        let collisions: Vec<(String, String)> = descriptor
            .triggers()
            .filter_map(|trigger| {
                self.commands
                    .iter()
                    .find(|c| c.answers_to(trigger))
                    .map(|c| (trigger.to_string(), c.name.clone()))
            })
            .collect();

        if let Some((name, existing)) = collisions.first() {
            match self.policy {
                CollisionPolicy::Reject => {
                    return Err(Error::DuplicateName {
                        name: name.clone(),
                        existing: existing.clone(),
                    });
                }
                CollisionPolicy::Replace => {
                    for (trigger, existing) in &collisions {
                        tracing::warn!(
                            "Command '{}' replaces '{}' (both answer to '{}')",
                            descriptor.name,
                            existing,
                            trigger
                        );
                    }
                    self.commands
                        .retain(|c| !collisions.iter().any(|(_, existing)| *existing == c.name));
                }
            }
        }

        tracing::debug!("Registered command '{}'", descriptor.name);
        self.commands.push(Arc::new(descriptor));
        Ok(())
    }

    /// Case-insensitive lookup: names first, then aliases, in registration order.
    pub fn lookup(&self, token: &str) -> Option<Arc<CommandDescriptor>> {
        let token = token.to_lowercase();
        self.commands
            .iter()
            .find(|c| c.name == token)
            .or_else(|| self.commands.iter().find(|c| c.aliases.contains(&token)))
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CommandDescriptor>> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Visible commands grouped by category, categories sorted.
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&CommandDescriptor>> {
        let mut groups: BTreeMap<&str, Vec<&CommandDescriptor>> = BTreeMap::new();
        for command in self.commands.iter().filter(|c| !c.hidden) {
            groups
                .entry(command.category.as_str())
                .or_default()
                .push(command.as_ref());
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandHandler, ExecutionContext};
    use crate::transport::{IncomingMessage, Transport};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn handle(
            &self,
            _transport: Arc<dyn Transport>,
            _message: &IncomingMessage,
            _ctx: &ExecutionContext,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(CommandDescriptor::new("ping", Noop).alias("speed"))
            .unwrap();
        registry
            .register(CommandDescriptor::new("uptime", Noop).alias("runtime"))
            .unwrap();
        registry
    }

    #[test]
    fn test_lookup_name_and_alias() {
        let registry = registry();
        assert_eq!(registry.lookup("ping").unwrap().name, "ping");
        assert_eq!(registry.lookup("PING").unwrap().name, "ping");
        assert_eq!(registry.lookup("Speed").unwrap().name, "ping");
        assert_eq!(registry.lookup("runtime").unwrap().name, "uptime");
        assert!(registry.lookup("play").is_none());
        assert!(registry.lookup("").is_none());
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let registry = registry();
        let first = registry.lookup("speed").unwrap();
        for _ in 0..10 {
            assert!(Arc::ptr_eq(&first, &registry.lookup("speed").unwrap()));
        }
    }

    #[test]
    fn test_name_match_beats_alias() {
        // `register` refuses this layout, so build the table directly.
        let mut registry = Registry::new();
        registry.commands.push(Arc::new(CommandDescriptor::new("a", Noop).alias("b")));
        registry.commands.push(Arc::new(CommandDescriptor::new("b", Noop)));
        assert_eq!(registry.lookup("b").unwrap().name, "b");
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = registry();

        let err = registry
            .register(CommandDescriptor::new("Ping", Noop))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName { ref existing, .. } if existing == "ping"));

        // An alias colliding with an existing alias.
        let err = registry
            .register(CommandDescriptor::new("latency", Noop).alias("speed"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName { ref name, .. } if name == "speed"));

        // A name colliding with an existing alias.
        assert!(registry.register(CommandDescriptor::new("runtime", Noop)).is_err());

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_replace_policy_last_wins() {
        let mut registry = Registry::with_policy(CollisionPolicy::Replace);
        registry
            .register(CommandDescriptor::new("ping", Noop).alias("speed").category("old"))
            .unwrap();
        registry
            .register(CommandDescriptor::new("latency", Noop).alias("speed").category("new"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("ping").is_none());
        assert_eq!(registry.lookup("speed").unwrap().name, "latency");
    }

    #[test]
    fn test_by_category_skips_hidden() {
        let mut registry = registry();
        registry
            .register(CommandDescriptor::new("mode", Noop).category("owner"))
            .unwrap();
        registry
            .register(CommandDescriptor::new("debug", Noop).category("owner").hidden())
            .unwrap();

        let groups = registry.by_category();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["general", "owner"]);
        assert_eq!(groups["general"].len(), 2);
        assert_eq!(groups["owner"].len(), 1);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.register(CommandDescriptor::new("  ", Noop)),
            Err(Error::Validation(_))
        ));
    }
}
