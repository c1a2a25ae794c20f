//! File query and file store ports.
//!
//! [`FileQuery`] reads the published tree and maps paths to permalinks.
//! [`FileStore`] reads and writes the working copy the agent edits, including
//! each file's knowledge-source metadata.

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use crate::core::types::RepoFile;

#[async_trait]
pub trait FileQuery: Send + Sync {
    /// `Ok(None)` when no file exists at `path`.
    async fn find(&self, path: &str) -> Result<Option<RepoFile>>;

    async fn list_tree(&self) -> Result<Vec<String>>;

    fn permalink(&self, path: &str) -> String;

    /// Inverse of [`FileQuery::permalink`]; `None` for URLs of other repositories.
    fn path_from_permalink(&self, uri: &Url) -> Option<String>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<RepoFile>>;

    /// Fails if a file already exists at the path.
    async fn create(&self, file: &RepoFile) -> Result<()>;

    /// Replace content and sources of an existing file.
    async fn update(&self, file: &RepoFile) -> Result<()>;

    async fn delete(&self, path: &str) -> Result<()>;
}
