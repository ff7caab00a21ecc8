//! Process-wide runtime state mutated by admin commands.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Visibility policy for non-admin commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Public,
    Private,
    InboxOnly,
    GroupsOnly,
    /// A configured value we don't understand. Always denies.
    Unrecognized(String),
}

impl Mode {
    /// Modes an operator may switch to.
    pub const VALID: [&'static str; 4] = ["public", "private", "inbox-only", "groups-only"];

    /// Parse a mode name, case-insensitively. Unknown names are kept as
    /// `Unrecognized` rather than rejected.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "public" => Mode::Public,
            "private" => Mode::Private,
            "inbox-only" => Mode::InboxOnly,
            "groups-only" => Mode::GroupsOnly,
            other => Mode::Unrecognized(other.to_string()),
        }
    }

    /// Strict parse used by the `mode` command.
    pub fn parse_valid(s: &str) -> Option<Self> {
        match Self::parse(s) {
            Mode::Unrecognized(_) => None,
            mode => Some(mode),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Mode::Public => "public",
            Mode::Private => "private",
            Mode::InboxOnly => "inbox-only",
            Mode::GroupsOnly => "groups-only",
            Mode::Unrecognized(s) => s,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable bot policy. Lives for the process; nothing is persisted.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub prefix: String,
    pub mode: Mode,
    pub blocked_senders: HashSet<String>,
    pub allowed_senders: HashSet<String>,
    pub owner_id: String,
    pub self_id: String,
}

impl RuntimeConfig {
    pub fn new(owner_id: &str, self_id: &str) -> Self {
        Self {
            prefix: ".".to_string(),
            mode: Mode::Private,
            blocked_senders: HashSet::new(),
            allowed_senders: HashSet::new(),
            owner_id: owner_id.to_string(),
            self_id: self_id.to_string(),
        }
    }

    /// Replace the command prefix. Empty or whitespace-only prefixes are rejected.
    pub fn set_prefix(&mut self, prefix: &str) -> Result<()> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(Error::Validation("prefix must not be empty".to_string()));
        }
        self.prefix = prefix.to_string();
        Ok(())
    }

    /// Chat id used to reach the owner directly.
    pub fn owner_chat(&self) -> String {
        format!("{}@c.us", self.owner_id)
    }
}

/// Shared handle to the runtime config.
///
/// Readers take a snapshot per request; values may change between two reads
/// in the same request.
#[derive(Debug, Clone)]
pub struct SharedRuntime(Arc<RwLock<RuntimeConfig>>);

impl SharedRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    pub async fn snapshot(&self) -> RuntimeConfig {
        self.0.read().await.clone()
    }

    pub async fn prefix(&self) -> String {
        self.0.read().await.prefix.clone()
    }

    pub async fn mode(&self) -> Mode {
        self.0.read().await.mode.clone()
    }

    pub async fn set_prefix(&self, prefix: &str) -> Result<String> {
        let mut config = self.0.write().await;
        config.set_prefix(prefix)?;
        Ok(config.prefix.clone())
    }

    pub async fn set_mode(&self, mode: Mode) {
        self.0.write().await.mode = mode;
    }

    /// Apply an arbitrary change under the write lock.
    #[cfg(test)]
    pub(crate) async fn update<F: FnOnce(&mut RuntimeConfig)>(&self, f: F) {
        f(&mut *self.0.write().await);
    }
}
