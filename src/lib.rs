//! cmdgate library root.

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod permission;
pub mod runtime;
pub mod transport;
pub mod web;

pub use auth::Arbiter;
pub use commands::{CommandDescriptor, CommandHandler, Registry};
pub use config::{load_settings, Settings};
pub use daemon::run_daemon;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
