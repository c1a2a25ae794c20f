//! Transcript files for task loop runs: `<dir>/<run-id>/<step>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::task_loop::StepRecord;

#[derive(Debug, Clone)]
pub struct TranscriptPaths {
    pub dir: PathBuf,
}

impl TranscriptPaths {
    pub fn new(base: &Path, run_id: &str) -> Self {
        Self {
            dir: base.join(run_id),
        }
    }

    pub fn step_path(&self, step: usize) -> PathBuf {
        self.dir.join(format!("{step}.json"))
    }
}

/// Writes one JSON file per loop step.
#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    paths: TranscriptPaths,
}

impl TranscriptWriter {
    pub fn create(base: &Path, run_id: &str) -> Result<Self> {
        let paths = TranscriptPaths::new(base, run_id);
        fs::create_dir_all(&paths.dir)
            .with_context(|| format!("create transcript dir {}", paths.dir.display()))?;
        Ok(Self { paths })
    }

    pub fn dir(&self) -> &Path {
        &self.paths.dir
    }

    pub fn write(&self, record: &StepRecord) -> Result<PathBuf> {
        let path = self.paths.step_path(record.step);
        write_json(&path, record)?;
        Ok(path)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}
