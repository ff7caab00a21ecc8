//! Error types for cmdgate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A command name or alias is already taken by another descriptor.
    #[error("Duplicate command name: '{name}' already registered by '{existing}'")]
    DuplicateName { name: String, existing: String },

    /// Malformed user input (phone number, prefix, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The transport rejected our credentials.
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    /// Another entry point currently owns the authentication attempt.
    #[error("Authentication is already being driven from the {owner}")]
    OwnershipConflict { owner: String },

    /// A command handler returned an error or panicked.
    #[error("Command '{command}' failed: {message}")]
    Handler { command: String, message: String },

    #[error("Session is not authenticated yet")]
    NotAuthenticated,

    #[error("Session is already authenticated")]
    AlreadyAuthenticated,

    /// Missing or invalid control-surface bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}
