//! Proposal store port, the local JSON store, and a conversation channel over
//! proposal review comments.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::core::types::{Comment, Proposal, ProposalContent, ProposalHandle, ThreadMessage};
use crate::io::channel::ConversationChannel;
use crate::io::write_atomic;

#[async_trait]
pub trait ProposalStore: Send + Sync {
    async fn create(&self, content: &ProposalContent) -> Result<ProposalHandle>;

    async fn fetch(&self, handle: &ProposalHandle) -> Result<Proposal>;

    async fn comment(&self, handle: &ProposalHandle, body: &str) -> Result<()>;

    async fn update(&self, handle: &ProposalHandle, content: &ProposalContent) -> Result<()>;
}

/// Proposals as pretty JSON files named `<id>.json`.
#[derive(Debug, Clone)]
pub struct LocalProposalStore {
    dir: PathBuf,
    author: String,
}

impl LocalProposalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            author: "docagent".to_string(),
        }
    }

    /// Store under `<root>/.docagent/proposals`.
    pub fn for_root(root: &Path) -> Self {
        Self::new(root.join(".docagent").join("proposals"))
    }

    fn path_for(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn next_id(&self) -> Result<u64> {
        if !self.dir.exists() {
            return Ok(1);
        }
        let mut max = 0;
        for entry in
            fs::read_dir(&self.dir).with_context(|| format!("read dir {}", self.dir.display()))?
        {
            let entry = entry.with_context(|| format!("read dir {}", self.dir.display()))?;
            let name = entry.file_name();
            let id = name
                .to_str()
                .and_then(|name| name.strip_suffix(".json"))
                .and_then(|stem| stem.parse::<u64>().ok());
            if let Some(id) = id {
                max = max.max(id);
            }
        }
        Ok(max + 1)
    }

    fn load(&self, id: u64) -> Result<Proposal> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(anyhow!("proposal {id} not found"));
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
    }

    fn save(&self, proposal: &Proposal) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(proposal).context("serialize proposal")?;
        buf.push('\n');
        write_atomic(&self.path_for(proposal.handle.id), &buf)
    }
}

#[async_trait]
impl ProposalStore for LocalProposalStore {
    #[instrument(skip_all, fields(title = %content.title))]
    async fn create(&self, content: &ProposalContent) -> Result<ProposalHandle> {
        let id = self.next_id()?;
        let handle = ProposalHandle {
            id,
            url: self.path_for(id).display().to_string(),
        };
        self.save(&Proposal {
            handle: handle.clone(),
            content: content.clone(),
            comments: Vec::new(),
            diff: String::new(),
        })?;
        debug!(id, "created proposal");
        Ok(handle)
    }

    async fn fetch(&self, handle: &ProposalHandle) -> Result<Proposal> {
        self.load(handle.id)
    }

    async fn comment(&self, handle: &ProposalHandle, body: &str) -> Result<()> {
        let mut proposal = self.load(handle.id)?;
        proposal.comments.push(Comment {
            author: self.author.clone(),
            body: body.to_string(),
        });
        self.save(&proposal)
    }

    #[instrument(skip_all, fields(id = handle.id))]
    async fn update(&self, handle: &ProposalHandle, content: &ProposalContent) -> Result<()> {
        let mut proposal = self.load(handle.id)?;
        proposal.content = content.clone();
        self.save(&proposal)?;
        debug!("updated proposal");
        Ok(())
    }
}

/// Review thread of one proposal, seen as a conversation: replies become
/// comments and history is the comment list.
#[derive(Clone)]
pub struct ProposalThread {
    store: Arc<dyn ProposalStore>,
    handle: ProposalHandle,
}

impl ProposalThread {
    pub fn new(store: Arc<dyn ProposalStore>, handle: ProposalHandle) -> Self {
        Self { store, handle }
    }
}

#[async_trait]
impl ConversationChannel for ProposalThread {
    async fn reply(&self, text: &str) -> Result<()> {
        self.store.comment(&self.handle, text).await
    }

    async fn history(&self) -> Result<Vec<ThreadMessage>> {
        let proposal = self.store.fetch(&self.handle).await?;
        Ok(proposal
            .comments
            .into_iter()
            .map(|comment| ThreadMessage {
                author: comment.author,
                text: comment.body,
                permalink: None,
            })
            .collect())
    }

    async fn signal_presence(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(title: &str) -> ProposalContent {
        ProposalContent {
            title: title.to_string(),
            description: "why".to_string(),
        }
    }

    #[tokio::test]
    async fn ids_increase_and_updates_persist() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = LocalProposalStore::for_root(temp.path());
        let first = store.create(&content("one")).await.expect("create");
        let second = store.create(&content("two")).await.expect("create");
        assert_eq!((first.id, second.id), (1, 2));

        store.update(&first, &content("one, revised")).await.expect("update");
        let fetched = store.fetch(&first).await.expect("fetch");
        assert_eq!(fetched.content.title, "one, revised");
    }

    #[tokio::test]
    async fn thread_replies_become_comments() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn ProposalStore> = Arc::new(LocalProposalStore::for_root(temp.path()));
        let handle = store.create(&content("x")).await.expect("create");
        let thread = ProposalThread::new(store.clone(), handle);
        thread.reply("Updated the intro.").await.expect("reply");
        let history = thread.history().await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "Updated the intro.");
        assert_eq!(history[0].author, "docagent");
    }

    #[tokio::test]
    async fn missing_proposal_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = LocalProposalStore::for_root(temp.path());
        let handle = ProposalHandle {
            id: 9,
            url: String::new(),
        };
        assert!(store.fetch(&handle).await.is_err());
    }
}
