//! Web server using Axum.

use std::future::Future;
use std::net::SocketAddr;

use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::router::create_app_router;
use super::AppState;
use crate::error::{Error, Result};

/// Largest request body accepted (bridge events carry message text only).
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Web server configuration.
pub struct WebServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            port: 3333,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Serve the control surface until `shutdown` resolves.
pub async fn run_server<F>(config: WebServerConfig, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if state.secret.is_none() {
        tracing::warn!("No web secret configured: the control surface is open to anyone who can reach it");
    }

    let app = create_app_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

    tracing::info!("Starting web server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
