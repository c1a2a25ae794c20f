//! In-memory and scripted doubles for the collaborator ports.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tempfile::TempDir;
use url::Url;

use crate::agents::AgentDeps;
use crate::core::format::MarkdownFormatter;
use crate::core::types::{
    Comment, Proposal, ProposalContent, ProposalHandle, RepoFile, SearchHit, ThreadMessage,
};
use crate::io::channel::ConversationChannel;
use crate::io::chat::{ChatModel, ChatSession, ChatTurn, Role};
use crate::io::config::{AgentConfig, RepositoryConfig};
use crate::io::files::{FileQuery, FileStore};
use crate::io::local_repo::LocalRepository;
use crate::io::proposal::ProposalStore;
use crate::io::retrieval::RetrievalIndex;
use crate::io::sources::{SourceBackend, SourceManager};

const PERMALINK_BASE: &str = "https://docs.example.com/blob/main/";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    /// The model call fails with this message.
    Fail(String),
}

impl From<&str> for ScriptedReply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

#[derive(Default)]
struct ModelLog {
    replies: VecDeque<ScriptedReply>,
    system_prompts: Vec<String>,
    sent: Vec<String>,
}

/// Chat model answering from a queue; records prompts and every sent message.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    log: Arc<Mutex<ModelLog>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedModel {
    pub fn new<I, R>(replies: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ScriptedReply>,
    {
        Self {
            log: Arc::new(Mutex::new(ModelLog {
                replies: replies.into_iter().map(Into::into).collect(),
                ..ModelLog::default()
            })),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Model calls made across all sessions.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn system_prompts(&self) -> Vec<String> {
        lock(&self.log).system_prompts.clone()
    }

    /// Messages sent to the model, in order.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.log).sent.clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn start_session(&self, system_prompt: &str) -> Result<Box<dyn ChatSession>> {
        lock(&self.log).system_prompts.push(system_prompt.to_string());
        Ok(Box::new(ScriptedSession {
            model: self.clone(),
            history: Vec::new(),
        }))
    }
}

pub struct ScriptedSession {
    model: ScriptedModel,
    history: Vec<ChatTurn>,
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn send(&mut self, text: &str) -> Result<String> {
        self.model.calls.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut log = lock(&self.model.log);
            log.sent.push(text.to_string());
            log.replies.pop_front()
        };
        self.history.push(ChatTurn {
            role: Role::User,
            text: text.to_string(),
        });
        match next {
            Some(ScriptedReply::Text(reply)) => {
                self.history.push(ChatTurn {
                    role: Role::Assistant,
                    text: reply.clone(),
                });
                Ok(reply)
            }
            Some(ScriptedReply::Fail(message)) => Err(anyhow!(message)),
            None => bail!("scripted model has no more replies"),
        }
    }

    fn history(&self) -> &[ChatTurn] {
        &self.history
    }
}

/// Conversation channel recording replies and presence signals.
#[derive(Default)]
pub struct RecordingChannel {
    history: Vec<ThreadMessage>,
    replies: Mutex<Vec<String>>,
    presence: AtomicUsize,
    fail_replies: bool,
    fail_presence: bool,
}

impl RecordingChannel {
    pub fn with_history(history: Vec<ThreadMessage>) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    /// Every reply fails.
    pub fn failing() -> Self {
        Self {
            fail_replies: true,
            ..Self::default()
        }
    }

    /// Every presence signal is counted, then fails.
    pub fn failing_presence() -> Self {
        Self {
            fail_presence: true,
            ..Self::default()
        }
    }

    pub fn replies(&self) -> Vec<String> {
        lock(&self.replies).clone()
    }

    /// Presence signals attempted so far, failed ones included.
    pub fn presence_signals(&self) -> usize {
        self.presence.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationChannel for RecordingChannel {
    async fn reply(&self, text: &str) -> Result<()> {
        if self.fail_replies {
            bail!("channel rejected the reply");
        }
        lock(&self.replies).push(text.to_string());
        Ok(())
    }

    async fn history(&self) -> Result<Vec<ThreadMessage>> {
        Ok(self.history.clone())
    }

    async fn signal_presence(&self) -> Result<()> {
        self.presence.fetch_add(1, Ordering::SeqCst);
        if self.fail_presence {
            bail!("presence indicator unavailable");
        }
        Ok(())
    }
}

/// File query and file store over one in-memory map.
#[derive(Default)]
pub struct MemoryFileStore {
    files: Mutex<BTreeMap<String, RepoFile>>,
}

impl MemoryFileStore {
    pub fn with_files(files: impl IntoIterator<Item = RepoFile>) -> Self {
        Self {
            files: Mutex::new(
                files
                    .into_iter()
                    .map(|file| (file.path.clone(), file))
                    .collect(),
            ),
        }
    }

    pub fn content(&self, path: &str) -> Option<String> {
        lock(&self.files).get(path).map(|file| file.content.clone())
    }

    pub fn paths(&self) -> Vec<String> {
        lock(&self.files).keys().cloned().collect()
    }
}

#[async_trait]
impl FileQuery for MemoryFileStore {
    async fn find(&self, path: &str) -> Result<Option<RepoFile>> {
        Ok(lock(&self.files).get(path).cloned())
    }

    async fn list_tree(&self) -> Result<Vec<String>> {
        Ok(self.paths())
    }

    fn permalink(&self, path: &str) -> String {
        format!("{PERMALINK_BASE}{path}")
    }

    fn path_from_permalink(&self, uri: &Url) -> Option<String> {
        uri.as_str()
            .strip_prefix(PERMALINK_BASE)
            .map(str::to_string)
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn get(&self, path: &str) -> Result<Option<RepoFile>> {
        Ok(lock(&self.files).get(path).cloned())
    }

    async fn create(&self, file: &RepoFile) -> Result<()> {
        let mut files = lock(&self.files);
        if files.contains_key(&file.path) {
            bail!("{} already exists", file.path);
        }
        files.insert(file.path.clone(), file.clone());
        Ok(())
    }

    async fn update(&self, file: &RepoFile) -> Result<()> {
        let mut files = lock(&self.files);
        let Some(slot) = files.get_mut(&file.path) else {
            bail!("{} does not exist", file.path);
        };
        *slot = file.clone();
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        lock(&self.files)
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("{path} does not exist"))
    }
}

/// Proposal store counting every call made to it.
#[derive(Default)]
pub struct MemoryProposalStore {
    proposals: Mutex<Vec<Proposal>>,
    calls: AtomicUsize,
}

impl MemoryProposalStore {
    pub fn with_proposals(proposals: Vec<Proposal>) -> Self {
        Self {
            proposals: Mutex::new(proposals),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn proposals(&self) -> Vec<Proposal> {
        lock(&self.proposals).clone()
    }

    fn with_proposal<T>(
        &self,
        handle: &ProposalHandle,
        f: impl FnOnce(&mut Proposal) -> T,
    ) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut proposals = lock(&self.proposals);
        let proposal = proposals
            .iter_mut()
            .find(|proposal| proposal.handle.id == handle.id)
            .ok_or_else(|| anyhow!("proposal {} not found", handle.id))?;
        Ok(f(proposal))
    }
}

#[async_trait]
impl ProposalStore for MemoryProposalStore {
    async fn create(&self, content: &ProposalContent) -> Result<ProposalHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut proposals = lock(&self.proposals);
        let id = proposals
            .iter()
            .map(|proposal| proposal.handle.id)
            .max()
            .unwrap_or(0)
            + 1;
        let handle = ProposalHandle {
            id,
            url: format!("https://docs.example.com/pull/{id}"),
        };
        proposals.push(Proposal {
            handle: handle.clone(),
            content: content.clone(),
            comments: Vec::new(),
            diff: String::new(),
        });
        Ok(handle)
    }

    async fn fetch(&self, handle: &ProposalHandle) -> Result<Proposal> {
        self.with_proposal(handle, |proposal| proposal.clone())
    }

    async fn comment(&self, handle: &ProposalHandle, body: &str) -> Result<()> {
        self.with_proposal(handle, |proposal| {
            proposal.comments.push(Comment {
                author: "docagent".to_string(),
                body: body.to_string(),
            });
        })
    }

    async fn update(&self, handle: &ProposalHandle, content: &ProposalContent) -> Result<()> {
        self.with_proposal(handle, |proposal| proposal.content = content.clone())
    }
}

/// Retrieval index returning fixed hits and recording queries.
#[derive(Default)]
pub struct MemoryRetrievalIndex {
    hits: Vec<SearchHit>,
    queries: Mutex<Vec<(String, usize, f64)>>,
    uploads: Mutex<BTreeMap<String, String>>,
}

impl MemoryRetrievalIndex {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    /// `(query, top_k, threshold)` per call.
    pub fn queries(&self) -> Vec<(String, usize, f64)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl RetrievalIndex for MemoryRetrievalIndex {
    async fn query(&self, query: &str, top_k: usize, threshold: f64) -> Result<Vec<SearchHit>> {
        lock(&self.queries).push((query.to_string(), top_k, threshold));
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }

    async fn upload(&self, source: &str, text: &str) -> Result<()> {
        lock(&self.uploads).insert(source.to_string(), text.to_string());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(lock(&self.uploads).keys().cloned().collect())
    }

    async fn delete(&self, source: &str) -> Result<()> {
        lock(&self.uploads).remove(source);
        Ok(())
    }
}

/// Source backend serving fixed documents for one host.
pub struct StaticSource {
    name: String,
    host: String,
    documents: BTreeMap<String, String>,
}

impl StaticSource {
    pub fn new<'a>(
        name: &str,
        host: &str,
        documents: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            documents: documents
                .into_iter()
                .map(|(uri, content)| (uri.to_string(), content.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl SourceBackend for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, uri: &Url) -> bool {
        uri.host_str() == Some(self.host.as_str())
    }

    async fn fetch(&self, uri: &Url) -> Result<Option<String>> {
        Ok(self.documents.get(uri.as_str()).cloned())
    }
}

/// A documentation checkout in a temporary directory.
pub struct TempRepo {
    dir: TempDir,
}

impl TempRepo {
    /// Create the directory and write `files` as `(path, content)` pairs.
    pub fn new<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&full, content)?;
        }
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, path: &str) -> PathBuf {
        self.dir.path().join(path)
    }

    pub fn read(&self, path: &str) -> Option<String> {
        fs::read_to_string(self.join(path)).ok()
    }

    pub fn repository(&self) -> Arc<LocalRepository> {
        Arc::new(LocalRepository::new(
            self.dir.path(),
            RepositoryConfig::default(),
        ))
    }
}

/// Agent dependencies over in-memory doubles: no retrieval index, no source
/// backends, markdown replies, default configuration.
pub fn memory_deps(
    model: &ScriptedModel,
    files: &Arc<MemoryFileStore>,
    proposals: &Arc<MemoryProposalStore>,
) -> AgentDeps {
    AgentDeps {
        model: Arc::new(model.clone()),
        files: files.clone(),
        store: files.clone(),
        proposals: proposals.clone(),
        retrieval: None,
        sources: SourceManager::new(),
        formatter: Arc::new(MarkdownFormatter),
        config: AgentConfig::default(),
    }
}
