//! Conversation channel port and the console adapter.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::types::ThreadMessage;

/// Where the user talks to the agent: a chat thread, a review thread, a terminal.
#[async_trait]
pub trait ConversationChannel: Send + Sync {
    async fn reply(&self, text: &str) -> Result<()>;

    async fn history(&self) -> Result<Vec<ThreadMessage>>;

    /// Show a typing indicator or similar. Best effort.
    async fn signal_presence(&self) -> Result<()>;
}

/// Fire-and-forget presence signal.
///
/// The spawned task never reports back; a failed signal is logged at debug
/// level and otherwise dropped. Callers may ignore the handle.
pub fn spawn_presence(channel: Arc<dyn ConversationChannel>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = channel.signal_presence().await {
            debug!(error = %err, "presence signal failed");
        }
    })
}

/// Channel writing replies to stdout. History comes from an optional JSON file
/// holding an array of thread messages.
#[derive(Debug, Clone, Default)]
pub struct ConsoleChannel {
    history_path: Option<PathBuf>,
}

impl ConsoleChannel {
    pub fn new(history_path: Option<PathBuf>) -> Self {
        Self { history_path }
    }
}

#[async_trait]
impl ConversationChannel for ConsoleChannel {
    async fn reply(&self, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }

    async fn history(&self) -> Result<Vec<ThreadMessage>> {
        let Some(path) = &self.history_path else {
            return Ok(Vec::new());
        };
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
    }

    async fn signal_presence(&self) -> Result<()> {
        Ok(())
    }
}
