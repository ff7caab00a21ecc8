//! Daemon wiring: session, dispatcher, control surface and terminal login.

mod events;

pub use events::EventRouter;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};

use crate::auth::{Arbiter, StdConsole, TerminalFlow};
use crate::commands::builtin;
use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::runtime::SharedRuntime;
use crate::transport::{BridgeTransport, OutgoingContent, Transport};
use crate::web::{run_server, AppState, WebServerConfig};

const CHANNEL_CAPACITY: usize = 256;

/// Run until Ctrl+C or the web server stops.
pub async fn run_daemon(settings: Settings) -> Result<()> {
    settings.validate()?;
    let started = Instant::now();

    let runtime = SharedRuntime::new(settings.runtime_config());
    let registry = Arc::new(builtin::load(settings.commands.on_collision, started)?);

    let main: Arc<dyn Transport> = Arc::new(BridgeTransport::new(settings.bridge_options()));
    let arbiter = Arc::new(Arbiter::new(Arc::clone(&main), settings.arbiter_options()));

    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (message_tx, message_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        runtime.clone(),
        Arc::clone(&main),
    ));
    tokio::spawn(dispatcher.run(message_rx));
    tokio::spawn(EventRouter::new(Arc::clone(&arbiter), message_tx, runtime.clone()).run(event_rx));

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let state = AppState {
        arbiter: Arc::clone(&arbiter),
        events: event_tx,
        secret: settings.web.secret.as_deref().map(Arc::from),
    };
    let web_config = WebServerConfig {
        port: settings.web.port,
        host: settings.web.host.clone(),
    };
    let mut server = tokio::spawn(run_server(web_config, state, async move {
        let _ = stop_rx.changed().await;
    }));

    if settings.terminal_enabled() {
        let flow = TerminalFlow::new(
            Arc::clone(&arbiter),
            StdConsole::new(),
            settings.terminal_options(),
        );
        tokio::spawn(async move {
            if let Err(e) = flow.run().await {
                tracing::error!("Terminal login stopped: {}", e);
            }
        });
    } else {
        tracing::info!("Terminal login disabled; use the web control surface to log in");
    }

    main.initialize().await?;
    tracing::info!("Waiting for session on {}", settings.bridge.url);

    let server_result = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        result = &mut server => Some(result),
    };

    shutdown(&arbiter, &runtime, main.as_ref()).await;
    let _ = stop_tx.send(true);

    let result = match server_result {
        Some(result) => result,
        None => server.await,
    };
    result.map_err(|e| Error::Other(format!("web server task failed: {}", e)))?
}

/// Best-effort goodbye to the owner and session teardown.
async fn shutdown(arbiter: &Arbiter, runtime: &SharedRuntime, main: &dyn Transport) {
    tracing::info!("Shutting down...");

    if arbiter.is_ready() {
        let owner = runtime.snapshot().await.owner_chat();
        if let Err(e) = arbiter
            .send(&owner, &OutgoingContent::text("🛑 Bot shutting down"))
            .await
        {
            tracing::warn!("Failed to notify owner: {}", e);
        }
    }

    if let Err(e) = main.destroy().await {
        tracing::warn!("Failed to destroy session: {}", e);
    }
}
