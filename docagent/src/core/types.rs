//! Shared data types passed between the loop, tool handlers and collaborators.
//!
//! These types carry no behaviour of their own. Collaborators own the real
//! artifacts; the core only holds handles and snapshots.

use serde::{Deserialize, Serialize};

/// A file as seen by the file query and file store collaborators.
///
/// `sources` is the knowledge-source metadata attached to the file (URIs of
/// threads, review comments, etc. that back its content).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl RepoFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }
}

/// Reference to a proposal owned by the proposal store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalHandle {
    pub id: u64,
    pub url: String,
}

/// Title and description of a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalContent {
    pub title: String,
    pub description: String,
}

/// Review feedback left on a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
}

/// Snapshot of a proposal as fetched from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub handle: ProposalHandle,
    pub content: ProposalContent,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Unified multi-file diff of the proposal against its base.
    #[serde(default)]
    pub diff: String,
}

/// One message of a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub author: String,
    pub text: String,
    #[serde(default)]
    pub permalink: Option<String>,
}

/// One retrieval-index hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub source: String,
    pub score: f64,
    pub text: String,
}

/// A named free-text block injected into the system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentContext {
    pub name: String,
    pub value: String,
}

impl EnvironmentContext {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
