//! File tools: read, create, modify, rename, delete and source linking.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::command::{CreateFile, DeleteFile, FindFile, LinkSources, ModifyFile, RenameFile};
use crate::core::hunk::{Hunk, apply_hunks, apply_hunks_strict};
use crate::core::patch::PatchError;
use crate::core::state::TaskState;
use crate::core::types::RepoFile;
use crate::core::xml::escape;
use crate::dispatch::Outcome;
use crate::io::files::{FileQuery, FileStore};

#[derive(Clone)]
pub struct FileTools {
    query: Arc<dyn FileQuery>,
    store: Arc<dyn FileStore>,
    strict_hunks: bool,
}

impl FileTools {
    pub fn new(query: Arc<dyn FileQuery>, store: Arc<dyn FileStore>, strict_hunks: bool) -> Self {
        Self {
            query,
            store,
            strict_hunks,
        }
    }

    #[instrument(skip_all, fields(path = %cmd.path))]
    pub async fn find_file(&self, cmd: &FindFile) -> Result<Outcome> {
        let Some(file) = self
            .query
            .find(&cmd.path)
            .await
            .with_context(|| format!("find {}", cmd.path))?
        else {
            return Ok(Outcome::soft_error(format!("File not found: {}", cmd.path)));
        };
        Ok(Outcome::observe(self.render_file(&file)))
    }

    fn render_file(&self, file: &RepoFile) -> String {
        let mut out = format!(
            "<file path=\"{}\" permalink=\"{}\">\n",
            escape(&file.path),
            escape(&self.query.permalink(&file.path))
        );
        for uri in &file.sources {
            out.push_str(&format!("<source>{}</source>\n", escape(uri)));
        }
        out.push_str("<content>\n");
        out.push_str(&file.content);
        if !file.content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("</content>\n</file>");
        out
    }

    #[instrument(skip_all, fields(path = %cmd.path))]
    pub async fn create_file(&self, state: &mut TaskState, cmd: &CreateFile) -> Result<Outcome> {
        let file = RepoFile::new(&cmd.path, &cmd.content).with_sources(dedup(&cmd.source_uris));
        self.store
            .create(&file)
            .await
            .with_context(|| format!("create {}", cmd.path))?;
        state.mark_file_changed();
        info!("file created");
        Ok(Outcome::observe(format!("Created {}.", cmd.path)))
    }

    #[instrument(skip_all, fields(path = %cmd.path, hunks = cmd.hunks.len()))]
    pub async fn modify_file(&self, state: &mut TaskState, cmd: &ModifyFile) -> Result<Outcome> {
        let file = self.existing(&cmd.path).await?;
        let content = self
            .edit(&file.content, &cmd.hunks)
            .with_context(|| format!("modify {}", cmd.path))?;
        self.store
            .update(&RepoFile { content, ..file })
            .await
            .with_context(|| format!("update {}", cmd.path))?;
        state.mark_file_changed();
        info!("file modified");
        Ok(Outcome::observe(format!("Modified {}.", cmd.path)))
    }

    #[instrument(skip_all, fields(old = %cmd.old_path, new = %cmd.new_path))]
    pub async fn rename_file(&self, state: &mut TaskState, cmd: &RenameFile) -> Result<Outcome> {
        let file = self.existing(&cmd.old_path).await?;
        let content = self
            .edit(&file.content, &cmd.hunks)
            .with_context(|| format!("modify {}", cmd.old_path))?;
        self.store
            .create(&RepoFile::new(&cmd.new_path, content).with_sources(file.sources))
            .await
            .with_context(|| format!("create {}", cmd.new_path))?;
        self.store
            .delete(&cmd.old_path)
            .await
            .with_context(|| format!("delete {}", cmd.old_path))?;
        state.mark_file_changed();
        info!("file renamed");
        Ok(Outcome::observe(format!(
            "Renamed {} to {}.",
            cmd.old_path, cmd.new_path
        )))
    }

    #[instrument(skip_all, fields(path = %cmd.path))]
    pub async fn delete_file(&self, state: &mut TaskState, cmd: &DeleteFile) -> Result<Outcome> {
        self.store
            .delete(&cmd.path)
            .await
            .with_context(|| format!("delete {}", cmd.path))?;
        state.mark_file_changed();
        info!("file deleted");
        Ok(Outcome::observe(format!("Deleted {}.", cmd.path)))
    }

    /// Attach URIs not already recorded on the file. Existing order is kept.
    #[instrument(skip_all, fields(path = %cmd.file_path))]
    pub async fn link_sources(&self, cmd: &LinkSources) -> Result<Outcome> {
        let mut file = self.existing(&cmd.file_path).await?;
        let before = file.sources.len();
        for uri in &cmd.uris {
            if !file.sources.contains(uri) {
                file.sources.push(uri.clone());
            }
        }
        let added = file.sources.len() - before;
        if added > 0 {
            self.store
                .update(&file)
                .await
                .with_context(|| format!("update {}", cmd.file_path))?;
        }
        info!(added, "sources linked");
        Ok(Outcome::observe(format!(
            "Linked {added} new source(s) to {}.",
            cmd.file_path
        )))
    }

    async fn existing(&self, path: &str) -> Result<RepoFile> {
        let file = self
            .store
            .get(path)
            .await
            .with_context(|| format!("read {path}"))?
            .ok_or_else(|| PatchError::MissingFile(path.to_string()))?;
        Ok(file)
    }

    fn edit(&self, content: &str, hunks: &[Hunk]) -> Result<String> {
        if self.strict_hunks {
            Ok(apply_hunks_strict(content, hunks)?)
        } else {
            Ok(apply_hunks(content, hunks))
        }
    }
}

fn dedup(uris: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(uris.len());
    for uri in uris {
        if !out.contains(uri) {
            out.push(uri.clone());
        }
    }
    out
}
