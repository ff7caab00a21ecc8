//! `ping`: round-trip check.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::commands::{CommandHandler, ExecutionContext};
use crate::error::Result;
use crate::transport::{IncomingMessage, Transport};

pub struct PingCommand;

#[async_trait]
impl CommandHandler for PingCommand {
    async fn handle(
        &self,
        _transport: Arc<dyn Transport>,
        _message: &IncomingMessage,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        let start = Instant::now();
        ctx.reply("Pinging...").await?;
        let elapsed = start.elapsed().as_millis();
        ctx.reply(&format!("Pong: {}ms", elapsed)).await?;
        ctx.react("✅").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin::test_support::owner_context;
    use crate::commands::Registry;
    use crate::runtime::{RuntimeConfig, SharedRuntime};
    use crate::transport::testing::{direct_message, Call, RecordingTransport};

    #[tokio::test]
    async fn test_ping_replies_and_reacts() {
        let transport = Arc::new(RecordingTransport::new());
        let runtime = SharedRuntime::new(RuntimeConfig::new("1", "2"));
        let message = direct_message("1", ".ping");
        let ctx = owner_context(&message, &runtime, Arc::new(Registry::new()), &transport).await;

        PingCommand
            .handle(Arc::clone(&transport) as Arc<dyn Transport>, &message, &ctx)
            .await
            .unwrap();

        let replies = transport.replies();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], "Pinging...");
        assert!(replies[1].starts_with("Pong: ") && replies[1].ends_with("ms"));
        assert_eq!(
            transport.calls().last(),
            Some(&Call::React {
                message_id: message.id.clone(),
                emoji: "✅".to_string()
            })
        );
    }
}
