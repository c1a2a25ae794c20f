//! Knowledge source lookup across platforms.
//!
//! Backends are tried in registration order; the first whose host predicate
//! accepts the URI answers the lookup.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::io::files::FileQuery;

#[async_trait]
pub trait SourceBackend: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, uri: &Url) -> bool;

    /// `Ok(None)` when the backend owns the URI but nothing exists there.
    async fn fetch(&self, uri: &Url) -> Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLookup {
    Found { backend: String, content: String },
    NotFound,
    Unsupported,
}

#[derive(Default, Clone)]
pub struct SourceManager {
    backends: Vec<Arc<dyn SourceBackend>>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Arc<dyn SourceBackend>) {
        self.backends.push(backend);
    }

    pub fn with(mut self, backend: Arc<dyn SourceBackend>) -> Self {
        self.register(backend);
        self
    }

    pub async fn lookup(&self, uri: &Url) -> Result<SourceLookup> {
        let Some(backend) = self.backends.iter().find(|backend| backend.matches(uri)) else {
            debug!(%uri, "no source backend matches");
            return Ok(SourceLookup::Unsupported);
        };
        debug!(%uri, backend = backend.name(), "fetching source");
        Ok(match backend.fetch(uri).await? {
            Some(content) => SourceLookup::Found {
                backend: backend.name().to_string(),
                content,
            },
            None => SourceLookup::NotFound,
        })
    }
}

/// Files of the documentation repository addressed by permalink.
pub struct RepositorySource {
    files: Arc<dyn FileQuery>,
    host: String,
}

impl RepositorySource {
    pub fn new(files: Arc<dyn FileQuery>, host: impl Into<String>) -> Self {
        Self {
            files,
            host: host.into(),
        }
    }
}

#[async_trait]
impl SourceBackend for RepositorySource {
    fn name(&self) -> &str {
        "repository"
    }

    fn matches(&self, uri: &Url) -> bool {
        uri.host_str() == Some(self.host.as_str())
    }

    async fn fetch(&self, uri: &Url) -> Result<Option<String>> {
        let Some(path) = self.files.path_from_permalink(uri) else {
            return Ok(None);
        };
        Ok(self.files.find(&path).await?.map(|file| file.content))
    }
}
