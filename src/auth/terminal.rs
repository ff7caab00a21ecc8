//! Interactive terminal login.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;

use super::arbiter::{Arbiter, QrCode};
use super::phone::validate_phone;
use super::qr::render_terminal;
use super::session::{Method, Owner, Phase};
use crate::error::{Error, Result};

/// Line-oriented operator console.
#[async_trait]
pub trait Console: Send {
    fn show(&mut self, text: &str);

    /// Print `prompt` and read one line. `None` once input is closed.
    async fn ask(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

pub struct StdConsole {
    lines: Lines<BufReader<Stdin>>,
}

impl StdConsole {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Console for StdConsole {
    fn show(&mut self, text: &str) {
        println!("{}", text);
    }

    async fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        print!("{}", prompt);
        io::stdout().flush()?;
        self.lines.next_line().await
    }
}

/// How long the method prompt waits before falling back to QR.
pub const METHOD_SELECTION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct TerminalOptions {
    /// Skip the method prompt (`AUTH_TYPE`)
    pub method: Option<Method>,
    /// Pre-supplied pairing number (`PAIRING_PHONE`)
    pub phone: Option<String>,
    pub method_timeout: Duration,
    /// Bound on phone and retry prompts; `None` waits forever
    pub input_timeout: Option<Duration>,
    pub max_phone_attempts: Option<u32>,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            method: None,
            phone: None,
            method_timeout: METHOD_SELECTION_TIMEOUT,
            input_timeout: None,
            max_phone_attempts: None,
        }
    }
}

/// How a login round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    LoggedIn,
    /// Another entry point owns authentication
    Deferred,
    /// Ownership was dropped underneath us (auth failure, disconnect)
    Reset,
    /// The operator stopped answering; ownership released
    Abandoned,
}

enum AfterFailure {
    Retry,
    UseQr,
}

pub struct TerminalFlow<C: Console> {
    arbiter: Arc<Arbiter>,
    console: C,
    options: TerminalOptions,
    remembered: Option<Method>,
    warned: bool,
}

impl<C: Console> TerminalFlow<C> {
    pub fn new(arbiter: Arc<Arbiter>, console: C, options: TerminalOptions) -> Self {
        Self {
            arbiter,
            console,
            options,
            remembered: None,
            warned: false,
        }
    }

    /// Start a login round whenever the main session asks for credentials.
    /// Returns when the operator abandons or the arbiter goes away.
    pub async fn run(mut self) -> Result<()> {
        let mut qr_rx = self.arbiter.subscribe_qr();
        let main = self.arbiter.main_session().to_string();

        loop {
            let payload = qr_rx
                .borrow_and_update()
                .as_ref()
                .filter(|qr| qr.session == main)
                .map(|qr| qr.payload.clone());

            if let Some(payload) = payload {
                match self.login(&payload, &mut qr_rx).await? {
                    RoundOutcome::Abandoned => {
                        tracing::info!("Terminal login abandoned; the web control surface can still log in");
                        return Ok(());
                    }
                    outcome => tracing::debug!("Terminal login round ended: {:?}", outcome),
                }
            }

            if qr_rx.changed().await.is_err() {
                return Ok(());
            }
        }
    }

    /// One login round, started by the QR `payload`.
    ///
    /// A round that fails gives up any terminal claim, so the web control
    /// surface is never left locked out.
    pub async fn login(
        &mut self,
        payload: &str,
        qr_rx: &mut watch::Receiver<Option<QrCode>>,
    ) -> Result<RoundOutcome> {
        let result = self.round(payload, qr_rx).await;
        if let Err(e) = &result {
            tracing::warn!("Terminal login failed: {}", e);
            self.arbiter.release(Owner::Terminal).await;
        }
        result
    }

    async fn round(
        &mut self,
        payload: &str,
        qr_rx: &mut watch::Receiver<Option<QrCode>>,
    ) -> Result<RoundOutcome> {
        let method = match self.claim().await {
            Ok(method) => method,
            Err(Error::OwnershipConflict { owner }) => {
                if !self.warned {
                    tracing::warn!("Authentication is being handled by the {}; terminal prompt suppressed", owner);
                    self.warned = true;
                }
                return Ok(RoundOutcome::Deferred);
            }
            Err(Error::AlreadyAuthenticated) => return Ok(RoundOutcome::LoggedIn),
            Err(e) => return Err(e),
        };
        self.warned = false;

        match method {
            Method::Pairing => self.pairing(payload, qr_rx).await,
            _ => self.follow(Some(payload), qr_rx).await,
        }
    }

    /// Claim the session and settle on a method.
    async fn claim(&mut self) -> Result<Method> {
        if let Some(method) = self.remembered.or(self.options.method) {
            self.arbiter.begin_terminal(method).await?;
            return Ok(method);
        }

        self.arbiter
            .begin_terminal_selection(self.options.method_timeout)
            .await?;
        let method = self.prompt_method().await?;
        self.arbiter.select_method(Owner::Terminal, method).await?;
        self.remembered = Some(method);
        Ok(method)
    }

    async fn prompt_method(&mut self) -> Result<Method> {
        self.console
            .show("\nChoose Authentication Method:\n1. QR Code\n2. Pairing Code");
        let answer =
            tokio::time::timeout(self.options.method_timeout, self.console.ask("Enter choice (1/2): "))
                .await;
        match answer {
            Ok(line) => Ok(match line?.as_deref().map(str::trim) {
                Some("2") => Method::Pairing,
                _ => Method::Qr,
            }),
            Err(_) => {
                self.console.show("\n⏰ No Selection Made, Defaulting to QR Code");
                Ok(Method::Qr)
            }
        }
    }

    async fn pairing(
        &mut self,
        payload: &str,
        qr_rx: &mut watch::Receiver<Option<QrCode>>,
    ) -> Result<RoundOutcome> {
        self.console.show("\n🔑 Pairing Code Requested");
        let phone = match self.phone().await? {
            Some(phone) => phone,
            None => return Ok(self.abandon().await),
        };

        loop {
            match self
                .arbiter
                .request_pairing_code(Owner::Terminal, &phone)
                .await
            {
                Ok(code) => {
                    self.console.show(&format!(
                        "\nPairing code: {}\nEnter this code on your phone under Settings → Linked Devices",
                        format_pairing_code(&code)
                    ));
                    return self.follow(None, qr_rx).await;
                }
                Err(Error::OwnershipConflict { .. }) => return Ok(RoundOutcome::Reset),
                Err(e) => {
                    self.console
                        .show(&format!("\n❌ Error Requesting Pairing Code: {}", e));
                    let choice = match self.after_failure().await? {
                        Some(choice) => choice,
                        None => return Ok(self.abandon().await),
                    };
                    self.arbiter
                        .begin_terminal_selection(self.options.method_timeout)
                        .await?;
                    match choice {
                        AfterFailure::Retry => {
                            self.arbiter
                                .select_method(Owner::Terminal, Method::Pairing)
                                .await?;
                        }
                        AfterFailure::UseQr => {
                            self.console.show("Falling Back to QR Code...");
                            self.arbiter
                                .select_method(Owner::Terminal, Method::Qr)
                                .await?;
                            self.remembered = Some(Method::Qr);
                            let latest = self.arbiter.current_qr(Owner::Terminal).await;
                            let current = latest.as_deref().unwrap_or(payload).to_string();
                            return self.follow(Some(&current), qr_rx).await;
                        }
                    }
                }
            }
        }
    }

    /// A valid phone number, or `None` when the operator gives up.
    async fn phone(&mut self) -> Result<Option<String>> {
        if let Some(preset) = self.options.phone.clone() {
            match validate_phone(&preset) {
                Ok(phone) => return Ok(Some(phone)),
                Err(e) => self.console.show(&format!("❌ PAIRING_PHONE ignored: {}", e)),
            }
        }

        let mut attempts = 0u32;
        loop {
            let answer = match self
                .input("Enter Your Phone Number (with country code, e.g. 254712345678): ")
                .await?
            {
                Some(answer) => answer,
                None => return Ok(None),
            };
            match validate_phone(&answer) {
                Ok(phone) => return Ok(Some(phone)),
                Err(e) => {
                    attempts += 1;
                    self.console.show(&format!("❌ {}", e));
                    if let Some(max) = self.options.max_phone_attempts {
                        if attempts >= max {
                            self.console.show("Too many invalid phone numbers");
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    async fn after_failure(&mut self) -> Result<Option<AfterFailure>> {
        self.console.show("1. Retry\n2. Use QR Code instead");
        Ok(self.input("Enter choice (1/2): ").await?.map(|answer| {
            if answer.trim() == "2" {
                AfterFailure::UseQr
            } else {
                AfterFailure::Retry
            }
        }))
    }

    /// Read a line under the input timeout. `None` on timeout or closed input.
    async fn input(&mut self, prompt: &str) -> Result<Option<String>> {
        let line = match self.options.input_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.console.ask(prompt)).await {
                Ok(line) => line?,
                Err(_) => {
                    self.console.show("\n⏰ Input timed out");
                    return Ok(None);
                }
            },
            None => self.console.ask(prompt).await?,
        };
        Ok(line)
    }

    async fn abandon(&mut self) -> RoundOutcome {
        self.remembered = None;
        self.arbiter.release(Owner::Terminal).await;
        RoundOutcome::Abandoned
    }

    /// Wait for the round to settle, rendering `first` and any rotation of
    /// the main session's QR code when given one.
    async fn follow(
        &mut self,
        first: Option<&str>,
        qr_rx: &mut watch::Receiver<Option<QrCode>>,
    ) -> Result<RoundOutcome> {
        let render = first.is_some();
        if let Some(payload) = first {
            self.show_qr(payload)?;
        }
        let main = self.arbiter.main_session().to_string();
        let mut ready_rx = self.arbiter.subscribe_ready();

        loop {
            if *ready_rx.borrow_and_update() {
                return Ok(self.logged_in());
            }
            tokio::select! {
                changed = qr_rx.changed() => {
                    if changed.is_err() {
                        return Ok(RoundOutcome::Reset);
                    }
                    let next = qr_rx.borrow_and_update().clone();
                    match next {
                        Some(qr) if qr.session == main => {
                            if render {
                                self.show_qr(&qr.payload)?;
                            }
                        }
                        Some(_) => {}
                        None => return Ok(self.settled().await),
                    }
                }
                changed = ready_rx.changed() => {
                    if changed.is_err() {
                        return Ok(RoundOutcome::Reset);
                    }
                }
            }
        }
    }

    async fn settled(&mut self) -> RoundOutcome {
        if self.arbiter.snapshot().await.session.phase == Phase::Authenticated {
            self.logged_in()
        } else {
            self.console.show("\nAUTH FAILURE, waiting for a new code...");
            RoundOutcome::Reset
        }
    }

    fn logged_in(&mut self) -> RoundOutcome {
        self.console.show("\n🔑 Logged In");
        RoundOutcome::LoggedIn
    }

    fn show_qr(&mut self, payload: &str) -> Result<()> {
        let rendered = render_terminal(payload)?;
        self.console
            .show(&format!("\nQR RECEIVED, scan it with your phone:\n{}", rendered));
        Ok(())
    }
}

/// `ABCD1234` → `ABCD-1234`; other shapes are shown as given.
pub fn format_pairing_code(code: &str) -> String {
    if code.len() == 8 && code.is_ascii() {
        format!("{}-{}", &code[..4], &code[4..])
    } else {
        code.to_string()
    }
}

/// Console fed from a fixed script, for tests.
#[cfg(test)]
pub(crate) struct ScriptedConsole {
    answers: std::collections::VecDeque<Option<String>>,
    pub shown: Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(test)]
impl ScriptedConsole {
    /// `None` entries never answer, simulating an absent operator.
    pub fn new(answers: &[Option<&str>]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.map(str::to_string)).collect(),
            shown: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn transcript(&self) -> Arc<std::sync::Mutex<Vec<String>>> {
        Arc::clone(&self.shown)
    }
}

#[cfg(test)]
#[async_trait]
impl Console for ScriptedConsole {
    fn show(&mut self, text: &str) {
        self.shown.lock().unwrap().push(text.to_string());
    }

    async fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.shown.lock().unwrap().push(prompt.to_string());
        match self.answers.pop_front() {
            Some(Some(line)) => Ok(Some(line)),
            Some(None) => std::future::pending().await,
            None => Ok(None),
        }
    }
}
