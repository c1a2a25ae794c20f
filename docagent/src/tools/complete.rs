//! Final answer delivery.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::command::AttemptComplete;
use crate::core::format::ResponseFormatter;
use crate::dispatch::Outcome;
use crate::io::channel::ConversationChannel;

#[derive(Clone)]
pub struct CompleteTool {
    channel: Arc<dyn ConversationChannel>,
    formatter: Arc<dyn ResponseFormatter>,
}

impl CompleteTool {
    pub fn new(channel: Arc<dyn ConversationChannel>, formatter: Arc<dyn ResponseFormatter>) -> Self {
        Self { channel, formatter }
    }

    #[instrument(skip_all, fields(messages = cmd.messages.len(), sources = cmd.sources.len()))]
    pub async fn attempt_complete(&self, cmd: &AttemptComplete) -> Result<Outcome> {
        let reply = self.formatter.render(cmd);
        self.channel.reply(&reply).await.context("deliver reply")?;
        info!(bytes = reply.len(), "reply delivered");
        Ok(Outcome::terminal(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::{Message, Source};
    use crate::core::format::MarkdownFormatter;
    use crate::test_support::RecordingChannel;

    #[tokio::test]
    async fn delivers_formatted_reply_and_terminates() {
        let channel = Arc::new(RecordingChannel::default());
        let tool = CompleteTool::new(channel.clone(), Arc::new(MarkdownFormatter));
        let outcome = tool
            .attempt_complete(&AttemptComplete {
                messages: vec![Message {
                    text: "Done.".to_string(),
                    source_ids: vec!["1".to_string()],
                }],
                sources: vec![Source {
                    id: "1".to_string(),
                    uri: "https://x/1".to_string(),
                    display_name: "x".to_string(),
                }],
            })
            .await
            .expect("complete");
        assert!(outcome.terminal);
        assert_eq!(channel.replies(), vec!["Done.[^1]\n\n[^1]: https://x/1".to_string()]);
    }

    #[tokio::test]
    async fn delivery_failure_is_hard() {
        let channel = Arc::new(RecordingChannel::failing());
        let tool = CompleteTool::new(channel, Arc::new(MarkdownFormatter));
        assert!(tool.attempt_complete(&AttemptComplete::default()).await.is_err());
    }
}
