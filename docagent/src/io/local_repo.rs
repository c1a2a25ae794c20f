//! Filesystem-backed documentation repository.
//!
//! Knowledge sources live in `.docagent/sources.json`, a map from file path to
//! source URIs. Writes go through a temp file and a rename.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use tracing::{debug, instrument};
use url::Url;

use crate::core::types::RepoFile;
use crate::io::config::RepositoryConfig;
use crate::io::files::{FileQuery, FileStore};
use crate::io::write_atomic;

const STATE_DIR: &str = ".docagent";

#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
    remote: RepositoryConfig,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>, remote: RepositoryConfig) -> Self {
        Self {
            root: root.into(),
            remote,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sources_path(&self) -> PathBuf {
        self.root.join(STATE_DIR).join("sources.json")
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty()
            || relative
                .components()
                .any(|part| !matches!(part, Component::Normal(_)))
        {
            bail!("invalid repository path {path:?}");
        }
        if relative.starts_with(STATE_DIR) {
            bail!("{path}: reserved path");
        }
        Ok(self.root.join(relative))
    }

    fn load_sources(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let path = self.sources_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
    }

    fn save_sources(&self, sources: &BTreeMap<String, Vec<String>>) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(sources).context("serialize sources")?;
        buf.push('\n');
        write_atomic(&self.sources_path(), &buf)
    }

    fn set_sources(&self, path: &str, uris: &[String]) -> Result<()> {
        let mut sources = self.load_sources()?;
        if uris.is_empty() {
            sources.remove(path);
        } else {
            sources.insert(path.to_string(), uris.to_vec());
        }
        self.save_sources(&sources)
    }

    fn read(&self, path: &str) -> Result<Option<RepoFile>> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&full).with_context(|| format!("read {}", full.display()))?;
        let sources = self.load_sources()?.remove(path).unwrap_or_default();
        Ok(Some(RepoFile::new(path, content).with_sources(sources)))
    }

    fn walk(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        let entries = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read dir {}", dir.display()))?;
            let path = entry.path();
            let name = entry.file_name();
            if name == STATE_DIR || name == ".git" {
                continue;
            }
            if path.is_dir() {
                self.walk(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|part| part.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FileQuery for LocalRepository {
    async fn find(&self, path: &str) -> Result<Option<RepoFile>> {
        self.read(path)
    }

    async fn list_tree(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        self.walk(&self.root, &mut paths)?;
        paths.sort();
        Ok(paths)
    }

    fn permalink(&self, path: &str) -> String {
        let remote = &self.remote;
        let Ok(mut url) = Url::parse(&format!("https://{}/", remote.host)) else {
            return format!(
                "https://{}/{}/{}/blob/{}/{}",
                remote.host, remote.owner, remote.name, remote.branch, path
            );
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .clear()
                .extend([
                    remote.owner.as_str(),
                    remote.name.as_str(),
                    "blob",
                    remote.branch.as_str(),
                ])
                .extend(path.split('/'));
        }
        url.into()
    }

    fn path_from_permalink(&self, uri: &Url) -> Option<String> {
        if uri.host_str() != Some(self.remote.host.as_str()) {
            return None;
        }
        let segments = uri
            .path_segments()?
            .map(|segment| {
                percent_decode_str(segment)
                    .decode_utf8()
                    .ok()
                    .map(|decoded| decoded.into_owned())
            })
            .collect::<Option<Vec<String>>>()?;
        match segments.as_slice() {
            [owner, name, blob, branch, rest @ ..]
                if *owner == self.remote.owner
                    && *name == self.remote.name
                    && blob == "blob"
                    && *branch == self.remote.branch
                    && !rest.is_empty() =>
            {
                Some(rest.join("/"))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl FileStore for LocalRepository {
    async fn get(&self, path: &str) -> Result<Option<RepoFile>> {
        self.read(path)
    }

    #[instrument(skip_all, fields(path = %file.path))]
    async fn create(&self, file: &RepoFile) -> Result<()> {
        let full = self.resolve(&file.path)?;
        if full.exists() {
            bail!("{}: file already exists", file.path);
        }
        write_atomic(&full, &file.content)?;
        self.set_sources(&file.path, &file.sources)?;
        debug!(bytes = file.content.len(), "created file");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %file.path))]
    async fn update(&self, file: &RepoFile) -> Result<()> {
        let full = self.resolve(&file.path)?;
        if !full.is_file() {
            return Err(anyhow!("{}: file not found", file.path));
        }
        write_atomic(&full, &file.content)?;
        self.set_sources(&file.path, &file.sources)?;
        debug!(bytes = file.content.len(), "updated file");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Err(anyhow!("{path}: file not found"));
        }
        fs::remove_file(&full).with_context(|| format!("remove {}", full.display()))?;
        self.set_sources(path, &[])?;
        debug!("deleted file");
        Ok(())
    }
}
