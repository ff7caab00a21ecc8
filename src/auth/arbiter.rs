//! Arbitrates login attempts between the terminal and the web surface.
//!
//! Every check-then-set on the session runs under one mutex; transport calls
//! happen after the lock is dropped, with the ownership claim already held.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use super::phone::validate_phone;
use super::session::{AuthSession, Method, Owner, Phase};
use crate::error::{Error, Result};
use crate::transport::{OutgoingContent, Transport, TransportEvent};

/// Latest QR payload and the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCode {
    pub session: String,
    pub payload: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSnapshot {
    #[serde(flatten)]
    pub session: AuthSession,
    pub ready: bool,
    /// Reason the last login attempt was rejected, until the next success
    pub last_failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ArbiterOptions {
    /// How long `/qr` waits for the transport to produce a code
    pub qr_wait: Duration,
}

impl Default for ArbiterOptions {
    fn default() -> Self {
        Self {
            qr_wait: Duration::from_secs(30),
        }
    }
}

struct State {
    session: AuthSession,
    /// Short-lived session driving a web login, if any
    transient: Option<Arc<dyn Transport>>,
}

pub struct Arbiter {
    state: Mutex<State>,
    main: Arc<dyn Transport>,
    options: ArbiterOptions,
    qr_tx: watch::Sender<Option<QrCode>>,
    ready_tx: watch::Sender<bool>,
    failure_tx: watch::Sender<Option<String>>,
}

impl Arbiter {
    pub fn new(main: Arc<dyn Transport>, options: ArbiterOptions) -> Self {
        let (qr_tx, _) = watch::channel(None);
        let (ready_tx, _) = watch::channel(false);
        let (failure_tx, _) = watch::channel(None);
        Self {
            state: Mutex::new(State {
                session: AuthSession::new(),
                transient: None,
            }),
            main,
            options,
            qr_tx,
            ready_tx,
            failure_tx,
        }
    }

    pub async fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            session: self.state.lock().await.session.clone(),
            ready: self.is_ready(),
            last_failure: self.failure_tx.borrow().clone(),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    pub fn subscribe_qr(&self) -> watch::Receiver<Option<QrCode>> {
        self.qr_tx.subscribe()
    }

    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    pub fn main_session(&self) -> &str {
        self.main.session()
    }

    /// Claim the session for the terminal and open the method prompt.
    pub async fn begin_terminal_selection(&self, timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.session.clone();
        next.claim(Owner::Terminal)?;
        let deadline = Utc::now()
            + chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::seconds(60));
        next.begin_selection(deadline)?;
        state.session = next;
        Ok(())
    }

    /// Claim the session for the terminal with a method already decided.
    pub async fn begin_terminal(&self, method: Method) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.session.clone();
        next.claim(Owner::Terminal)?;
        next.choose(method)?;
        state.session = next;
        Ok(())
    }

    /// Commit the owner's method choice.
    pub async fn select_method(&self, who: Owner, method: Method) -> Result<()> {
        let mut state = self.state.lock().await;
        state.session.ensure_owner(who)?;
        state.session.choose(method)
    }

    /// Give up ownership if `who` holds it.
    pub async fn release(&self, who: Owner) {
        let mut state = self.state.lock().await;
        if state.session.owner != who {
            return;
        }
        tracing::info!("Authentication released by {}", who);
        let transient = state.transient.take();
        state.session.release();
        drop(state);
        if let Some(transient) = transient {
            destroy_quietly(transient.as_ref()).await;
        }
    }

    /// Latest QR payload for the current session of `who`, if any.
    pub async fn current_qr(&self, who: Owner) -> Option<String> {
        let driver = self.driver_for(who).await;
        self.qr_tx
            .borrow()
            .as_ref()
            .filter(|qr| qr.session == driver)
            .map(|qr| qr.payload.clone())
    }

    /// Session name logins by `who` run on.
    async fn driver_for(&self, who: Owner) -> String {
        let state = self.state.lock().await;
        match (&state.transient, who) {
            (Some(transient), Owner::Web) => transient.session().to_string(),
            _ => self.main.session().to_string(),
        }
    }

    /// Request a pairing code for `phone` on behalf of `who`.
    ///
    /// The number is validated before anything else. On failure the web
    /// flow releases ownership; the terminal flow keeps it and lands in
    /// `failed` so the operator can retry or fall back to QR.
    pub async fn request_pairing_code(&self, who: Owner, phone: &str) -> Result<String> {
        let phone = validate_phone(phone)?;

        let driver = {
            let mut state = self.state.lock().await;
            state.session.ensure_owner(who)?;
            if state.session.phase != Phase::PairingPending {
                state.session.choose(Method::Pairing)?;
            }
            match (&state.transient, who) {
                (Some(transient), Owner::Web) => Arc::clone(transient),
                _ => Arc::clone(&self.main),
            }
        };

        tracing::info!("Requesting pairing code for {} via '{}'", phone, driver.session());
        match driver.request_pairing_code(&phone).await {
            Ok(code) => {
                let mut state = self.state.lock().await;
                if state.session.owner == who {
                    state.session.pairing_code_issued = true;
                }
                Ok(code)
            }
            Err(e) => {
                tracing::warn!("Pairing code request failed: {}", e);
                match who {
                    Owner::Web => self.release(Owner::Web).await,
                    _ => {
                        let mut state = self.state.lock().await;
                        if state.session.owner == who {
                            state.session.transition(Phase::Failed)?;
                        }
                    }
                }
                Err(e)
            }
        }
    }

    /// Web entry point: start a QR login and return the code to scan.
    pub async fn begin_web_qr(&self) -> Result<String> {
        let driver = self.claim_for_web(Method::Qr).await?;

        let result = self.wait_for_qr(driver.session()).await;
        if result.is_err() {
            self.release(Owner::Web).await;
        }
        result
    }

    /// Web entry point: start a pairing-code login for `phone`.
    pub async fn begin_web_pairing(&self, phone: &str) -> Result<String> {
        // Reject malformed numbers before claiming anything.
        validate_phone(phone)?;
        self.claim_for_web(Method::Pairing).await?;
        self.request_pairing_code(Owner::Web, phone).await
    }

    /// Claim for the web surface, pick the session to drive, start it if new.
    async fn claim_for_web(&self, method: Method) -> Result<Arc<dyn Transport>> {
        let (driver, fresh) = {
            let mut state = self.state.lock().await;
            let mut next = state.session.clone();
            next.claim(Owner::Web)?;
            if next.method != method || !matches!(next.phase, Phase::QrPending | Phase::PairingPending) {
                if next.phase != Phase::Idle {
                    next.transition(Phase::Idle)?;
                }
                next.choose(method)?;
            }
            state.session = next;

            match &state.transient {
                Some(transient) => (Arc::clone(transient), false),
                None => match self.main.transient() {
                    Some(transient) => {
                        state.transient = Some(Arc::clone(&transient));
                        (transient, true)
                    }
                    None => (Arc::clone(&self.main), false),
                },
            }
        };

        tracing::info!(
            "Web login claimed ({:?}) on session '{}'",
            method,
            driver.session()
        );

        if fresh {
            if let Err(e) = driver.initialize().await {
                self.release(Owner::Web).await;
                return Err(e);
            }
        }
        Ok(driver)
    }

    /// Wait for a QR code from `session`. A rejection reported while waiting
    /// ends the wait with `AuthFailure`.
    async fn wait_for_qr(&self, session: &str) -> Result<String> {
        let mut qr_rx = self.qr_tx.subscribe();
        let mut failure_rx = self.failure_tx.subscribe();
        failure_rx.borrow_and_update();

        let wait = async {
            loop {
                let payload = qr_rx
                    .borrow_and_update()
                    .as_ref()
                    .filter(|qr| qr.session == session)
                    .map(|qr| qr.payload.clone());
                if let Some(payload) = payload {
                    return Ok(payload);
                }

                tokio::select! {
                    changed = qr_rx.changed() => {
                        if changed.is_err() {
                            return Err(Error::Transport("QR channel closed".to_string()));
                        }
                    }
                    changed = failure_rx.changed() => {
                        if changed.is_err() {
                            return Err(Error::Transport("failure channel closed".to_string()));
                        }
                        if let Some(reason) = failure_rx.borrow_and_update().clone() {
                            return Err(Error::AuthFailure(reason));
                        }
                    }
                }
            }
        };

        match tokio::time::timeout(self.options.qr_wait, wait).await {
            Ok(result) => result,
            Err(_) => Err(Error::Transport(format!(
                "no QR code received within {}s",
                self.options.qr_wait.as_secs()
            ))),
        }
    }

    /// Send through the main session once it is ready.
    pub async fn send(&self, target: &str, content: &OutgoingContent) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotAuthenticated);
        }
        self.main.send_message(target, content).await
    }

    /// Feed a transport event from `session` into the state machine.
    /// Chat messages are not the arbiter's concern and are ignored.
    pub async fn handle_event(&self, session: &str, event: &TransportEvent) {
        let (is_main, is_transient) = {
            let state = self.state.lock().await;
            (
                session == self.main.session(),
                state
                    .transient
                    .as_ref()
                    .is_some_and(|t| t.session() == session),
            )
        };
        if !is_main && !is_transient {
            tracing::debug!("Ignoring event from stale session '{}'", session);
            return;
        }

        match event {
            TransportEvent::Message(_) => {}
            TransportEvent::QrCode { payload } => self.on_qr(session, payload).await,
            TransportEvent::Authenticated => self.on_authenticated(is_transient).await,
            TransportEvent::Ready => {
                if is_main {
                    self.on_ready().await;
                }
            }
            TransportEvent::AuthFailure { reason } => self.fail(reason).await,
            TransportEvent::Disconnected { reason } => {
                if is_main {
                    self.on_disconnected(reason).await;
                }
            }
        }
    }

    async fn on_qr(&self, session: &str, payload: &str) {
        let state = self.state.lock().await;
        if state.session.phase == Phase::Authenticated {
            return;
        }
        drop(state);
        self.qr_tx.send_replace(Some(QrCode {
            session: session.to_string(),
            payload: payload.to_string(),
        }));
    }

    async fn on_authenticated(&self, via_transient: bool) {
        self.state.lock().await.session.authenticated();
        self.qr_tx.send_replace(None);
        tracing::info!("Logged in");

        if via_transient {
            // Credentials are stored now; restart the main session on them.
            if let Err(e) = self.main.initialize().await {
                self.fail(&format!("main session failed to start after web login: {}", e))
                    .await;
            }
        }
    }

    async fn on_ready(&self) {
        let transient = {
            let mut state = self.state.lock().await;
            state.session.ready();
            state.transient.take()
        };
        if let Some(transient) = transient {
            destroy_quietly(transient.as_ref()).await;
        }
        self.ready_tx.send_replace(true);
        self.failure_tx.send_replace(None);
        tracing::info!("Main session ready");
    }

    /// Record a rejected login and free both entry points.
    async fn fail(&self, reason: &str) {
        let error = Error::AuthFailure(reason.to_string());
        tracing::error!("{}", error);
        self.reset().await;
        self.failure_tx.send_replace(Some(reason.to_string()));
    }

    async fn on_disconnected(&self, reason: &str) {
        tracing::warn!("Main session disconnected: {}", reason);
        self.reset().await;
        // Restart so the transport starts emitting QR codes again.
        if let Err(e) = self.main.initialize().await {
            tracing::error!("Failed to restart main session: {}", e);
        }
    }

    /// Back to an unowned idle session with no login in flight.
    async fn reset(&self) {
        let transient = {
            let mut state = self.state.lock().await;
            state.session.release();
            state.transient.take()
        };
        if let Some(transient) = transient {
            destroy_quietly(transient.as_ref()).await;
        }
        self.ready_tx.send_replace(false);
        self.qr_tx.send_replace(None);
    }
}

async fn destroy_quietly(transport: &dyn Transport) {
    if let Err(e) = transport.destroy().await {
        tracing::warn!("Failed to destroy session '{}': {}", transport.session(), e);
    }
}
