//! Chat model port and the replay model used by `docagent replay`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

/// Starts chat sessions bound to one system prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn start_session(&self, system_prompt: &str) -> Result<Box<dyn ChatSession>>;
}

/// A conversation that keeps its own history between calls.
#[async_trait]
pub trait ChatSession: Send {
    /// Send one user turn and return the model's reply.
    async fn send(&mut self, text: &str) -> Result<String>;

    fn history(&self) -> &[ChatTurn];
}

/// Model that answers with a fixed list of replies, in order.
#[derive(Debug, Clone, Default)]
pub struct ReplayModel {
    replies: Arc<Mutex<VecDeque<String>>>,
    calls: Arc<AtomicUsize>,
}

impl ReplayModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().map(Into::into).collect())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Parse a script: replies separated by lines containing only `---`.
    pub fn from_script(script: &str) -> Self {
        let mut replies = Vec::new();
        let mut current = String::new();
        for line in script.split_inclusive('\n') {
            if line.trim_end_matches(['\n', '\r']) == "---" {
                replies.push(std::mem::take(&mut current));
            } else {
                current.push_str(line);
            }
        }
        replies.push(current);
        Self::new(
            replies
                .into_iter()
                .map(|reply| reply.trim().to_string())
                .filter(|reply| !reply.is_empty()),
        )
    }

    /// Number of replies handed out so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|queue| queue.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatModel for ReplayModel {
    async fn start_session(&self, system_prompt: &str) -> Result<Box<dyn ChatSession>> {
        debug!(prompt_bytes = system_prompt.len(), "replay session started");
        Ok(Box::new(ReplaySession {
            model: self.clone(),
            history: Vec::new(),
        }))
    }
}

#[derive(Debug)]
pub struct ReplaySession {
    model: ReplayModel,
    history: Vec<ChatTurn>,
}

#[async_trait]
impl ChatSession for ReplaySession {
    async fn send(&mut self, text: &str) -> Result<String> {
        let reply = self
            .model
            .replies
            .lock()
            .map_err(|_| anyhow!("replay script lock poisoned"))?
            .pop_front()
            .ok_or_else(|| anyhow!("replay script exhausted"))?;
        self.model.calls.fetch_add(1, Ordering::SeqCst);
        self.history.push(ChatTurn {
            role: Role::User,
            text: text.to_string(),
        });
        self.history.push(ChatTurn {
            role: Role::Assistant,
            text: reply.clone(),
        });
        Ok(reply)
    }

    fn history(&self) -> &[ChatTurn] {
        &self.history
    }
}
