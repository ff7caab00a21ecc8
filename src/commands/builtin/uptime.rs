//! `uptime`: how long the process has been running.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::commands::{CommandHandler, ExecutionContext};
use crate::error::Result;
use crate::transport::{IncomingMessage, Transport};

pub struct UptimeCommand {
    started: Instant,
}

impl UptimeCommand {
    pub fn new(started: Instant) -> Self {
        Self { started }
    }
}

/// Render as `<d>d <h>h <m>m <s>s`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
}

#[async_trait]
impl CommandHandler for UptimeCommand {
    async fn handle(
        &self,
        _transport: Arc<dyn Transport>,
        _message: &IncomingMessage,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        ctx.reply(&format!("*Uptime:* {}", format_uptime(self.started.elapsed())))
            .await
    }
}
