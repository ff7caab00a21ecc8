//! CLI commands for cmdgate using clap.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Instant;

use crate::commands::{builtin, Registry};
use crate::config::{load_settings, Overrides, Settings};
use crate::daemon::run_daemon;
use crate::web::auth::{generate_token, DEFAULT_TOKEN_HOURS};

/// cmdgate - prefix-command bot for a chat session, with terminal and web login.
#[derive(Parser)]
#[command(name = "cmdgate")]
#[command(version)]
#[command(about = "Command dispatcher and session login arbiter for a chat bot", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the bot: session, dispatcher, control surface and terminal login
    Run {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// List registered commands
    Commands {
        /// Include commands hidden from the help menu
        #[arg(long)]
        all: bool,
    },

    /// Print a bearer token for the control surface
    Token {
        /// Subject recorded in the token
        #[arg(long, default_value = "operator")]
        subject: String,

        /// Lifetime in hours
        #[arg(long, default_value_t = DEFAULT_TOKEN_HOURS)]
        hours: u64,

        /// Signing secret; defaults to the configured web secret
        #[arg(long, env = "WEB_SECRET", hide_env_values = true)]
        secret: Option<String>,
    },
}

impl Commands {
    /// Run the command.
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Run { overrides } => cmd_run(overrides).await,
            Command::Commands { all } => cmd_commands(all),
            Command::Token {
                subject,
                hours,
                secret,
            } => cmd_token(&subject, hours, secret),
        }
    }
}

fn settings_with(overrides: Overrides) -> Result<Settings> {
    let mut settings = load_settings().context("Failed to load settings")?;
    settings.apply(overrides);
    Ok(settings)
}

async fn cmd_run(overrides: Overrides) -> Result<()> {
    let settings = settings_with(overrides)?;
    settings.validate().context("Invalid configuration")?;
    run_daemon(settings).await?;
    Ok(())
}

fn cmd_commands(all: bool) -> Result<()> {
    let settings = settings_with(Overrides::default())?;
    let registry: Registry = builtin::load(settings.commands.on_collision, Instant::now())?;
    let prefix = settings.bot.prefix.trim();

    println!("{} commands (prefix '{}'):", registry.len(), prefix);
    for command in registry.iter().filter(|c| all || !c.hidden) {
        let aliases = if command.aliases.is_empty() {
            String::new()
        } else {
            format!(" ({})", command.aliases.join(", "))
        };
        let owner = if command.restricted_to_owner { " [owner]" } else { "" };
        println!(
            "  {}{}{}{}  [{}] {}",
            prefix, command.name, aliases, owner, command.category, command.description
        );
        if let Some(usage) = &command.usage {
            println!("      usage: {}{}", prefix, usage);
        }
    }
    Ok(())
}

fn cmd_token(subject: &str, hours: u64, secret: Option<String>) -> Result<()> {
    let secret = match secret {
        Some(secret) => secret,
        None => settings_with(Overrides::default())?
            .web
            .secret
            .context("No web secret configured: set WEB_SECRET or web.secret")?,
    };
    let token = generate_token(&secret, subject, hours)?;
    println!("{}", token);
    Ok(())
}
