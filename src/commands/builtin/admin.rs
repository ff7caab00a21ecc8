//! Owner-only commands that change the runtime config.

use std::sync::Arc;

use async_trait::async_trait;

use crate::commands::{CommandHandler, ExecutionContext};
use crate::error::Result;
use crate::runtime::Mode;
use crate::transport::{IncomingMessage, Transport};

/// `prefix [new]`: show or change the command prefix.
pub struct PrefixCommand;

#[async_trait]
impl CommandHandler for PrefixCommand {
    async fn handle(
        &self,
        _transport: Arc<dyn Transport>,
        _message: &IncomingMessage,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        let Some(new_prefix) = ctx.args.first() else {
            let current = ctx.runtime.prefix().await;
            return ctx.reply(&format!("Current prefix: {}", current)).await;
        };

        let prefix = ctx.runtime.set_prefix(new_prefix).await?;
        tracing::info!("Prefix changed to '{}' by {}", prefix, ctx.sender);
        ctx.reply(&format!("✅ Command Prefix Changed to: {}", prefix))
            .await
    }
}

/// `mode [new]`: show or change the visibility mode.
pub struct ModeCommand;

#[async_trait]
impl CommandHandler for ModeCommand {
    async fn handle(
        &self,
        _transport: Arc<dyn Transport>,
        _message: &IncomingMessage,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        let Some(mode) = ctx.first_arg().as_deref().and_then(Mode::parse_valid) else {
            let current = ctx.runtime.mode().await;
            return ctx
                .reply(&format!(
                    "Current mode: {}\nValid modes: {}",
                    current,
                    Mode::VALID.join(", ")
                ))
                .await;
        };

        ctx.runtime.set_mode(mode.clone()).await;
        tracing::info!("Mode changed to '{}' by {}", mode, ctx.sender);
        ctx.reply(&format!("✅ Bot Mode Changed to: {}", mode)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin::test_support::owner_context;
    use crate::commands::Registry;
    use crate::runtime::{RuntimeConfig, SharedRuntime};
    use crate::transport::testing::{direct_message, RecordingTransport};

    async fn run(
        handler: &dyn CommandHandler,
        runtime: &SharedRuntime,
        body: &str,
    ) -> (Result<()>, Vec<String>) {
        let transport = Arc::new(RecordingTransport::new());
        let message = direct_message("1", body);
        let ctx = owner_context(&message, runtime, Arc::new(Registry::new()), &transport).await;
        let result = handler
            .handle(Arc::clone(&transport) as Arc<dyn Transport>, &message, &ctx)
            .await;
        (result, transport.replies())
    }

    #[tokio::test]
    async fn test_prefix_show_and_change() {
        let runtime = SharedRuntime::new(RuntimeConfig::new("1", "2"));

        let (result, replies) = run(&PrefixCommand, &runtime, ".prefix").await;
        assert!(result.is_ok());
        assert_eq!(replies, vec!["Current prefix: .".to_string()]);

        let (result, replies) = run(&PrefixCommand, &runtime, ".prefix !").await;
        assert!(result.is_ok());
        assert_eq!(replies, vec!["✅ Command Prefix Changed to: !".to_string()]);
        assert_eq!(runtime.prefix().await, "!");
    }

    #[tokio::test]
    async fn test_mode_show_and_change() {
        let runtime = SharedRuntime::new(RuntimeConfig::new("1", "2"));

        let (_, replies) = run(&ModeCommand, &runtime, ".mode sideways").await;
        assert_eq!(
            replies,
            vec!["Current mode: private\nValid modes: public, private, inbox-only, groups-only".to_string()]
        );
        assert_eq!(runtime.mode().await, Mode::Private);

        let (result, replies) = run(&ModeCommand, &runtime, ".mode GROUPS-ONLY").await;
        assert!(result.is_ok());
        assert_eq!(replies, vec!["✅ Bot Mode Changed to: groups-only".to_string()]);
        assert_eq!(runtime.mode().await, Mode::GroupsOnly);
    }
}
