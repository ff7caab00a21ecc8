//! Configuration loading for cmdgate.
//!
//! Precedence, lowest first: built-in defaults, `~/.cmdgate/settings.json`,
//! `.env` (loaded by `main`), environment variables and command-line flags.

use std::collections::HashSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::auth::{ArbiterOptions, Method, TerminalOptions};
use crate::commands::CollisionPolicy;
use crate::error::{Error, Result};
use crate::runtime::{Mode, RuntimeConfig};
use crate::transport::bare_id;
use crate::transport::bridge::BridgeOptions;

/// Get the cmdgate home directory (~/.cmdgate).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".cmdgate"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.cmdgate/settings.json, or defaults if it is absent.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_settings_path()?)
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        tracing::debug!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Bot identity and policy.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BotSettings {
    /// The bot's own number (`BOT_NUMBER`)
    pub number: Option<String>,
    /// Owner number (`OWNER_NUMBER`)
    pub owner: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub blocked_users: Vec<String>,
    #[serde(default)]
    pub allowed_senders: Vec<String>,
}

fn default_prefix() -> String {
    ".".to_string()
}

fn default_mode() -> String {
    "private".to_string()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            number: None,
            owner: None,
            prefix: default_prefix(),
            mode: default_mode(),
            blocked_users: Vec::new(),
            allowed_senders: Vec::new(),
        }
    }
}

/// Session authentication.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthSettings {
    /// Credential store handed to the transport
    #[serde(default = "default_auth_path")]
    pub path: PathBuf,
    /// `qr`, `qr-code`, `pairing` or `pairing-code`
    pub method: Option<String>,
    pub pairing_phone: Option<String>,
    #[serde(default)]
    pub headless: bool,
    /// Force the terminal front-end on or off
    pub terminal: Option<bool>,
    #[serde(default = "default_qr_wait")]
    pub qr_wait_secs: u64,
    pub input_timeout_secs: Option<u64>,
    pub max_phone_attempts: Option<u32>,
}

fn default_auth_path() -> PathBuf {
    PathBuf::from("./auth")
}

fn default_qr_wait() -> u64 {
    30
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            path: default_auth_path(),
            method: None,
            pairing_phone: None,
            headless: false,
            terminal: None,
            qr_wait_secs: default_qr_wait(),
            input_timeout_secs: None,
            max_phone_attempts: None,
        }
    }
}

/// Messaging bridge sidecar.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BridgeSettings {
    #[serde(default = "default_bridge_url")]
    pub url: String,
    #[serde(default = "default_true")]
    pub transient_sessions: bool,
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:8088".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            transient_sessions: true,
        }
    }
}

/// HTTP control surface.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WebSettings {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// HS256 secret for bearer tokens; the surface is open without one
    pub secret: Option<String>,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    3333
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            secret: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CommandSettings {
    #[serde(default)]
    pub on_collision: CollisionPolicy,
}

/// cmdgate settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub bot: BotSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub bridge: BridgeSettings,

    #[serde(default)]
    pub web: WebSettings,

    #[serde(default)]
    pub commands: CommandSettings,
}

/// Environment and command-line overrides.
#[derive(Args, Clone, Debug, Default)]
pub struct Overrides {
    /// The bot's own number
    #[arg(long, env = "BOT_NUMBER")]
    pub bot_number: Option<String>,

    /// Owner number, with country code
    #[arg(long, env = "OWNER_NUMBER")]
    pub owner_number: Option<String>,

    #[arg(long, env = "BOT_PREFIX")]
    pub prefix: Option<String>,

    /// public, private, inbox-only or groups-only
    #[arg(long, env = "BOT_MODE")]
    pub mode: Option<String>,

    /// Comma-separated numbers that may not use the bot
    #[arg(long, env = "BLOCKED_USERS")]
    pub blocked_users: Option<String>,

    /// Comma-separated numbers that bypass the mode check
    #[arg(long, env = "ALLOWED_SENDERS")]
    pub allowed_senders: Option<String>,

    #[arg(long, env = "AUTH_PATH")]
    pub auth_path: Option<PathBuf>,

    /// qr or pairing-code; skips the method prompt
    #[arg(long, env = "AUTH_TYPE")]
    pub auth_type: Option<String>,

    #[arg(long, env = "PAIRING_PHONE")]
    pub pairing_phone: Option<String>,

    #[arg(long, env = "HEADLESS")]
    pub headless: Option<bool>,

    /// Never prompt on the terminal
    #[arg(long)]
    pub no_terminal: bool,

    #[arg(long, env = "BRIDGE_URL")]
    pub bridge_url: Option<String>,

    #[arg(long, env = "WEB_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "WEB_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "WEB_SECRET", hide_env_values = true)]
    pub web_secret: Option<String>,
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Bare number form of a configured id (`+254 7..@c.us` → `2547..`).
fn normalize_number(raw: &str) -> String {
    bare_id(raw.trim())
        .chars()
        .filter(|c| !matches!(c, '+' | ' ' | '-'))
        .collect()
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

impl Settings {
    /// Layer environment and command-line values over the file settings.
    pub fn apply(&mut self, o: Overrides) {
        if let Some(v) = o.bot_number {
            self.bot.number = Some(v);
        }
        if let Some(v) = o.owner_number {
            self.bot.owner = Some(v);
        }
        if let Some(v) = o.prefix {
            self.bot.prefix = v;
        }
        if let Some(v) = o.mode {
            self.bot.mode = v;
        }
        if let Some(v) = o.blocked_users {
            self.bot.blocked_users = split_list(&v);
        }
        if let Some(v) = o.allowed_senders {
            self.bot.allowed_senders = split_list(&v);
        }
        if let Some(v) = o.auth_path {
            self.auth.path = v;
        }
        if let Some(v) = o.auth_type {
            self.auth.method = Some(v);
        }
        if let Some(v) = o.pairing_phone {
            self.auth.pairing_phone = Some(v);
        }
        if let Some(v) = o.headless {
            self.auth.headless = v;
        }
        if o.no_terminal {
            self.auth.terminal = Some(false);
        }
        if let Some(v) = o.bridge_url {
            self.bridge.url = v;
        }
        if let Some(v) = o.port {
            self.web.port = v;
        }
        if let Some(v) = o.host {
            self.web.host = v;
        }
        if let Some(v) = o.web_secret {
            self.web.secret = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot.prefix.trim().is_empty() {
            return Err(Error::Validation("prefix must not be empty".to_string()));
        }
        match self.bot.owner.as_deref().map(normalize_number) {
            Some(owner) if !owner.is_empty() => {}
            _ => {
                return Err(Error::Config(
                    "owner number is required (OWNER_NUMBER or bot.owner)".to_string(),
                ))
            }
        }
        if let Some(method) = self.auth.method.as_deref() {
            if Method::parse(method).is_none() {
                return Err(Error::Config(format!(
                    "unknown auth method '{}': expected qr or pairing-code",
                    method
                )));
            }
        }
        if self.web.secret.as_deref().is_some_and(|s| s.is_empty()) {
            return Err(Error::Config("web secret must not be empty".to_string()));
        }
        Ok(())
    }

    /// Initial runtime policy. Unknown modes are kept and fail closed.
    pub fn runtime_config(&self) -> RuntimeConfig {
        let owner = self.bot.owner.as_deref().map(normalize_number).unwrap_or_default();
        let own = self.bot.number.as_deref().map(normalize_number).unwrap_or_default();

        let mut config = RuntimeConfig::new(&owner, &own);
        config.prefix = self.bot.prefix.trim().to_string();
        config.mode = Mode::parse(&self.bot.mode);
        if let Mode::Unrecognized(mode) = &config.mode {
            tracing::warn!("Unknown bot mode '{}': every non-owner command will be denied", mode);
        }
        config.blocked_senders = normalized_set(&self.bot.blocked_users);
        config.allowed_senders = normalized_set(&self.bot.allowed_senders);
        config
    }

    /// Whether to run the interactive terminal login.
    pub fn terminal_enabled(&self) -> bool {
        self.auth
            .terminal
            .unwrap_or_else(|| !self.auth.headless && std::io::stdin().is_terminal())
    }

    pub fn terminal_options(&self) -> TerminalOptions {
        TerminalOptions {
            method: self.auth.method.as_deref().and_then(Method::parse),
            phone: self.auth.pairing_phone.clone(),
            input_timeout: self.auth.input_timeout_secs.map(secs),
            max_phone_attempts: self.auth.max_phone_attempts,
            ..TerminalOptions::default()
        }
    }

    pub fn arbiter_options(&self) -> ArbiterOptions {
        ArbiterOptions {
            qr_wait: secs(self.auth.qr_wait_secs),
        }
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            base_url: self.bridge.url.trim_end_matches('/').to_string(),
            auth_path: self.auth.path.clone(),
            headless: self.auth.headless,
            transient_sessions: self.bridge.transient_sessions,
        }
    }
}

fn normalized_set(ids: &[String]) -> HashSet<String> {
    ids.iter()
        .map(|id| normalize_number(id))
        .filter(|id| !id.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings.bot.prefix, ".");
        assert_eq!(settings.bot.mode, "private");
        assert_eq!(settings.auth.path, PathBuf::from("./auth"));
        assert_eq!(settings.bridge.url, "http://127.0.0.1:8088");
        assert_eq!(settings.web.port, 3333);
        assert_eq!(settings.auth.qr_wait_secs, 30);
        assert_eq!(
            settings.terminal_options().method_timeout,
            Duration::from_secs(60)
        );
        assert_eq!(settings.commands.on_collision, CollisionPolicy::Reject);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"bot": {"owner": "254700000000", "mode": "public"},
                "commands": {"on_collision": "replace"},
                "auth": {"input_timeout_secs": 120}}"#,
        )
        .unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.bot.prefix, ".");
        assert_eq!(settings.bot.mode, "public");
        assert_eq!(settings.commands.on_collision, CollisionPolicy::Replace);
        assert_eq!(
            settings.terminal_options().input_timeout,
            Some(Duration::from_secs(120))
        );
        settings.validate().unwrap();
    }

    #[test]
    fn test_overrides_win() {
        let mut settings = Settings::default();
        settings.bot.prefix = "!".to_string();
        settings.apply(Overrides {
            owner_number: Some("+254 700 000 000".to_string()),
            prefix: Some("#".to_string()),
            blocked_users: Some("111, 222@c.us,".to_string()),
            auth_type: Some("pairing-code".to_string()),
            no_terminal: true,
            port: Some(8080),
            ..Overrides::default()
        });

        settings.validate().unwrap();
        assert!(!settings.terminal_enabled());
        assert_eq!(settings.web.port, 8080);
        assert_eq!(settings.terminal_options().method, Some(Method::Pairing));

        let runtime = settings.runtime_config();
        assert_eq!(runtime.prefix, "#");
        assert_eq!(runtime.owner_id, "254700000000");
        assert!(runtime.blocked_senders.contains("111"));
        assert!(runtime.blocked_senders.contains("222"));
        assert_eq!(runtime.blocked_senders.len(), 2);
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        assert!(matches!(settings.validate(), Err(Error::Config(_))));

        settings.bot.owner = Some("254700000000".to_string());
        settings.bot.prefix = " ".to_string();
        assert!(matches!(settings.validate(), Err(Error::Validation(_))));

        settings.bot.prefix = ".".to_string();
        settings.auth.method = Some("sms".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_unknown_mode_is_kept() {
        let mut settings = Settings::default();
        settings.bot.mode = "friends-only".to_string();
        assert_eq!(
            settings.runtime_config().mode,
            Mode::Unrecognized("friends-only".to_string())
        );
    }
}
