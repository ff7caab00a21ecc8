//! HTTP control surface (Axum).

pub mod api;
pub mod auth;
pub mod error;
pub mod router;
pub mod server;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::auth::Arbiter;
use crate::transport::SessionEvent;

pub use server::{run_server, WebServerConfig};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub arbiter: Arc<Arbiter>,
    /// Bridge events, forwarded to the daemon's event router
    pub events: mpsc::Sender<SessionEvent>,
    /// Bearer-token secret; `None` leaves the surface open
    pub secret: Option<Arc<str>>,
}
