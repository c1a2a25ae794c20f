//! Collaborator ports and the adapters that implement them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub mod channel;
pub mod chat;
pub mod config;
pub mod context;
pub mod files;
pub mod local_repo;
pub mod prompt;
pub mod proposal;
pub mod resolve;
pub mod retrieval;
pub mod sources;
pub mod transcript;

/// Write through a sibling temp file and rename over the target.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
