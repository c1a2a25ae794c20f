//! Agent configuration stored under `.docagent/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::write_atomic;

/// Agent configuration (TOML).
///
/// Missing fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Step budget for conversational Q&A.
    pub answer_max_steps: usize,

    /// Step budget for generating a proposal from a conversation.
    pub generate_max_steps: usize,

    /// Step budget for refining a proposal from review feedback.
    pub refine_max_steps: usize,

    /// Treat a hunk whose search text is missing as a hard error instead of a no-op.
    pub strict_hunks: bool,

    /// Reply sent to the user when a task loop fails.
    pub failure_notice: String,

    pub repository: RepositoryConfig,
}

/// Where the documentation repository is published. Used for permalinks and
/// to recognise repository URIs in `find_source`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepositoryConfig {
    pub host: String,
    pub owner: String,
    pub name: String,
    pub branch: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            owner: "acme".to_string(),
            name: "docs".to_string(),
            branch: "main".to_string(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            answer_max_steps: 10,
            generate_max_steps: 30,
            refine_max_steps: 20,
            strict_hunks: false,
            failure_notice: "Sorry, something went wrong while working on this. Please try again."
                .to_string(),
            repository: RepositoryConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.answer_max_steps == 0 {
            return Err(anyhow!("answer_max_steps must be > 0"));
        }
        if self.generate_max_steps == 0 {
            return Err(anyhow!("generate_max_steps must be > 0"));
        }
        if self.refine_max_steps == 0 {
            return Err(anyhow!("refine_max_steps must be > 0"));
        }
        if self.failure_notice.trim().is_empty() {
            return Err(anyhow!("failure_notice must not be empty"));
        }
        let repo = &self.repository;
        if [&repo.host, &repo.owner, &repo.name, &repo.branch]
            .iter()
            .any(|value| value.trim().is_empty())
        {
            return Err(anyhow!("repository host, owner, name and branch must be set"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = AgentConfig {
            strict_hunks: true,
            ..AgentConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "answer_max_steps = 4\n[repository]\nowner = \"octo\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.answer_max_steps, 4);
        assert_eq!(cfg.generate_max_steps, 30);
        assert_eq!(cfg.repository.owner, "octo");
        assert_eq!(cfg.repository.host, "github.com");
    }

    #[test]
    fn zero_budget_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "refine_max_steps = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("refine_max_steps"));
    }
}
