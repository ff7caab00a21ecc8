//! Authentication session state and its legal transitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    MethodSelection,
    QrPending,
    PairingPending,
    Failed,
    Authenticated,
}

impl Phase {
    fn can_move_to(self, to: Phase) -> bool {
        use Phase::*;
        match to {
            _ if self == to => true,
            Idle | Authenticated => true,
            MethodSelection => matches!(self, Idle | Failed),
            QrPending => matches!(self, Idle | MethodSelection),
            PairingPending => matches!(self, Idle | MethodSelection | Failed),
            Failed => matches!(self, QrPending | PairingPending),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Unset,
    Qr,
    Pairing,
}

impl Method {
    /// Parse an `AUTH_TYPE`-style value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "qr" | "qr-code" => Some(Method::Qr),
            "pairing" | "pairing-code" => Some(Method::Pairing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Owner {
    None,
    Terminal,
    Web,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Owner::None => "nobody",
            Owner::Terminal => "terminal",
            Owner::Web => "web control surface",
        })
    }
}

/// The single per-process authentication state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthSession {
    pub phase: Phase,
    pub method: Method,
    pub owner: Owner,
    /// Method-selection timeout, while a selection prompt is open
    pub deadline: Option<DateTime<Utc>>,
    /// A pairing code was handed out and is waiting to be entered
    pub pairing_code_issued: bool,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            method: Method::Unset,
            owner: Owner::None,
            deadline: None,
            pairing_code_issued: false,
        }
    }

    /// Whether the ownership claim is held against other entry points.
    pub fn is_locked(&self) -> bool {
        self.owner != Owner::None && !matches!(self.phase, Phase::Idle | Phase::Authenticated)
    }

    /// Claim the right to drive authentication.
    ///
    /// Re-claiming by the current owner succeeds. A rejected claim leaves the
    /// state untouched.
    pub fn claim(&mut self, who: Owner) -> Result<()> {
        if who == Owner::None {
            return Err(Error::Other("cannot claim authentication for nobody".to_string()));
        }
        if self.phase == Phase::Authenticated {
            return Err(Error::AlreadyAuthenticated);
        }
        if self.owner != who && self.is_locked() {
            return Err(Error::OwnershipConflict {
                owner: self.owner.to_string(),
            });
        }
        self.owner = who;
        Ok(())
    }

    /// Check that `who` currently owns the session.
    pub fn ensure_owner(&self, who: Owner) -> Result<()> {
        if self.owner == who {
            Ok(())
        } else {
            Err(Error::OwnershipConflict {
                owner: self.owner.to_string(),
            })
        }
    }

    pub fn transition(&mut self, to: Phase) -> Result<()> {
        if !self.phase.can_move_to(to) {
            return Err(Error::Other(format!(
                "invalid authentication transition {:?} -> {:?}",
                self.phase, to
            )));
        }
        tracing::debug!("Auth phase {:?} -> {:?} (owner: {})", self.phase, to, self.owner);
        self.phase = to;
        if to != Phase::MethodSelection {
            self.deadline = None;
        }
        Ok(())
    }

    /// Open the method prompt, closing at `deadline`.
    pub fn begin_selection(&mut self, deadline: DateTime<Utc>) -> Result<()> {
        self.transition(Phase::MethodSelection)?;
        self.method = Method::Unset;
        self.deadline = Some(deadline);
        Ok(())
    }

    /// Commit to a credential method and enter its pending phase.
    pub fn choose(&mut self, method: Method) -> Result<()> {
        let phase = match method {
            Method::Qr => Phase::QrPending,
            Method::Pairing => Phase::PairingPending,
            Method::Unset => return Err(Error::Other("cannot choose an unset method".to_string())),
        };
        self.transition(phase)?;
        self.method = method;
        self.pairing_code_issued = false;
        Ok(())
    }

    /// Back to `idle` with nobody owning the session.
    pub fn release(&mut self) {
        *self = Self::new();
    }

    pub fn authenticated(&mut self) {
        self.phase = Phase::Authenticated;
        self.deadline = None;
    }

    /// Main session confirmed ready; ownership is no longer needed.
    pub fn ready(&mut self) {
        self.authenticated();
        self.owner = Owner::None;
        self.pairing_code_issued = false;
    }
}
