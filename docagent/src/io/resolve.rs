//! Realises parsed diff records against a file store.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::diff::Diff;
use crate::core::patch::{PatchError, PatchOutcome, apply_patch};
use crate::core::types::RepoFile;
use crate::io::files::FileStore;

/// Apply one diff record.
///
/// New files are patched from an empty baseline. Renames create the new path
/// (keeping the old file's sources) and then delete the old one. Anything else
/// is patched in place. Any hunk that cannot be placed fails the whole record
/// with [`PatchError::Rejected`] and nothing is written.
#[instrument(skip_all, fields(old = %diff.old_path, new = %diff.new_path))]
pub async fn resolve_diff(diff: &Diff, store: &dyn FileStore) -> Result<()> {
    if diff.is_deleted {
        store
            .delete(&diff.old_path)
            .await
            .with_context(|| format!("delete {}", diff.old_path))?;
        info!("deleted");
        return Ok(());
    }

    if diff.is_new_file {
        let outcome = patched(&diff.new_path, "", &diff.body)?;
        store
            .create(&RepoFile::new(&diff.new_path, outcome.text))
            .await
            .with_context(|| format!("create {}", diff.new_path))?;
        info!("created");
        return Ok(());
    }

    let source_path = if diff.is_rename() {
        &diff.old_path
    } else {
        &diff.new_path
    };
    let current = store
        .get(source_path)
        .await
        .with_context(|| format!("read {source_path}"))?
        .ok_or_else(|| PatchError::MissingFile(source_path.clone()))?;
    let outcome = patched(source_path, &current.content, &diff.body)?;

    if diff.is_rename() {
        store
            .create(&RepoFile::new(&diff.new_path, outcome.text).with_sources(current.sources))
            .await
            .with_context(|| format!("create {}", diff.new_path))?;
        store
            .delete(&diff.old_path)
            .await
            .with_context(|| format!("delete {}", diff.old_path))?;
        info!("renamed");
    } else {
        store
            .update(&RepoFile {
                content: outcome.text,
                ..current
            })
            .await
            .with_context(|| format!("update {}", diff.new_path))?;
        info!("updated");
    }
    Ok(())
}

fn patched(path: &str, content: &str, body: &str) -> Result<PatchOutcome, PatchError> {
    let outcome = apply_patch(content, body)?;
    if !outcome.is_complete() {
        return Err(PatchError::Rejected {
            path: path.to_string(),
            hunks: outcome.rejected(),
        });
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diff::parse_diff;
    use crate::test_support::MemoryFileStore;

    #[tokio::test]
    async fn edits_in_place_and_keeps_sources() {
        let store = MemoryFileStore::with_files([
            RepoFile::new("file1.txt", "Hello\nWorld\n").with_sources(vec!["u1".to_string()])
        ]);
        let diff = parse_diff(
            "diff --git a/file1.txt b/file1.txt\n--- a/file1.txt\n+++ b/file1.txt\n@@ -1,2 +1,2 @@\n-Hello\n+Hi\n World\n",
        );
        resolve_diff(&diff[0], &store).await.expect("resolve");
        let file = store.get("file1.txt").await.expect("get").expect("file");
        assert_eq!(file.content, "Hi\nWorld\n");
        assert_eq!(file.sources, vec!["u1"]);
    }

    #[tokio::test]
    async fn creates_new_files() {
        let store = MemoryFileStore::default();
        let diff = parse_diff(
            "diff --git a/n.md b/n.md\nnew file mode 100644\n--- /dev/null\n+++ b/n.md\n@@ -0,0 +1 @@\n+new\n",
        );
        resolve_diff(&diff[0], &store).await.expect("resolve");
        assert_eq!(store.content("n.md").as_deref(), Some("new\n"));
    }

    #[tokio::test]
    async fn rename_moves_content_and_sources() {
        let store = MemoryFileStore::with_files([
            RepoFile::new("old.md", "a\nb\n").with_sources(vec!["u".to_string()])
        ]);
        let diff = parse_diff(
            "diff --git a/old.md b/new.md\nrename from old.md\nrename to new.md\n@@ -1,2 +1,2 @@\n a\n-b\n+B\n",
        );
        resolve_diff(&diff[0], &store).await.expect("resolve");
        assert_eq!(store.content("old.md"), None);
        let moved = store.get("new.md").await.expect("get").expect("file");
        assert_eq!(moved.content, "a\nB\n");
        assert_eq!(moved.sources, vec!["u"]);
    }

    #[tokio::test]
    async fn partial_apply_is_rejected_without_writing() {
        let store = MemoryFileStore::with_files([RepoFile::new("a.md", "a\nb\n")]);
        let diff = parse_diff(
            "diff --git a/a.md b/a.md\n@@ -1 +1 @@\n-a\n+A\n@@ -2 +2 @@\n-zzz\n+Z\n",
        );
        let err = resolve_diff(&diff[0], &store).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<PatchError>(),
            Some(&PatchError::Rejected {
                path: "a.md".to_string(),
                hunks: vec![2]
            })
        );
        assert_eq!(store.content("a.md").as_deref(), Some("a\nb\n"));
    }

    #[tokio::test]
    async fn missing_target_is_reported() {
        let store = MemoryFileStore::default();
        let diff = parse_diff("diff --git a/x.md b/x.md\n@@ -1 +1 @@\n-a\n+b\n");
        let err = resolve_diff(&diff[0], &store).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<PatchError>(),
            Some(&PatchError::MissingFile("x.md".to_string()))
        );
    }
}
