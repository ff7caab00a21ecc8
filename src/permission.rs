//! Permission evaluation: may this sender run this command right now?
//!
//! Rules, first match wins:
//! 1. blocked senders are denied;
//! 2. owner and self are always allowed;
//! 3. owner-only commands deny everyone else;
//! 4. allow-listed senders are allowed;
//! 5. the global mode decides.

use std::fmt;

use crate::commands::{CommandDescriptor, ContextFlags};
use crate::runtime::{Mode, RuntimeConfig};

/// Who sent a message, as far as the policy cares.
#[derive(Debug, Clone, Copy)]
pub struct Sender<'a> {
    /// Bare sender id (no `@server` suffix)
    pub id: &'a str,
    pub is_group: bool,
    /// Sent from the bot's own account
    pub from_me: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Blocked,
    OwnerOnly,
    ModeRestricted,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DenyReason::Blocked => "blocked",
            DenyReason::OwnerOnly => "owner-only",
            DenyReason::ModeRestricted => "mode-restricted",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny(reason) => Some(*reason),
        }
    }
}

/// An unset id on either side never matches.
fn same_id(sender: &str, configured: &str) -> bool {
    !sender.is_empty() && !configured.is_empty() && sender == configured
}

/// Identity flags for `sender` under `config`.
pub fn classify(sender: &Sender<'_>, config: &RuntimeConfig) -> ContextFlags {
    ContextFlags {
        is_owner: same_id(sender.id, &config.owner_id),
        is_self: sender.from_me || same_id(sender.id, &config.self_id),
        is_group: sender.is_group,
        is_allowed_sender: config.allowed_senders.contains(sender.id),
    }
}

/// Decide whether `sender` may invoke `command`. Pure; no side effects.
pub fn evaluate(sender: &Sender<'_>, command: &CommandDescriptor, config: &RuntimeConfig) -> Decision {
    if config.blocked_senders.contains(sender.id) {
        return Decision::Deny(DenyReason::Blocked);
    }

    let flags = classify(sender, config);
    if flags.is_owner || flags.is_self {
        return Decision::Allow;
    }

    if command.restricted_to_owner {
        return Decision::Deny(DenyReason::OwnerOnly);
    }

    if flags.is_allowed_sender {
        return Decision::Allow;
    }

    let allowed = match &config.mode {
        Mode::Public => true,
        Mode::Private => false,
        Mode::InboxOnly => !sender.is_group,
        Mode::GroupsOnly => sender.is_group,
        Mode::Unrecognized(_) => false,
    };

    if allowed {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::ModeRestricted)
    }
}
