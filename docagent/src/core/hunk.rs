//! Literal search/replace editing of file content.
//!
//! Each hunk replaces the first occurrence of its `search` text. A hunk whose
//! `search` text is missing is skipped by [`apply_hunks`]; [`apply_hunks_strict`]
//! reports it instead. Applying the same hunks twice is not safe: the second
//! pass either misses or edits already-edited text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub search: String,
    pub replace: String,
}

impl Hunk {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HunkError {
    #[error("hunk {index}: search text not found")]
    SearchNotFound { index: usize },
    #[error("hunk {index}: search text is empty")]
    EmptySearch { index: usize },
}

/// Apply hunks in order, silently skipping hunks whose search text is absent
/// or empty.
pub fn apply_hunks(content: &str, hunks: &[Hunk]) -> String {
    let mut current = content.to_string();
    for hunk in hunks {
        if let Some(next) = replace_first(&current, hunk) {
            current = next;
        }
    }
    current
}

/// Apply hunks in order, failing on the first hunk whose search text is empty
/// or absent.
pub fn apply_hunks_strict(content: &str, hunks: &[Hunk]) -> Result<String, HunkError> {
    let mut current = content.to_string();
    for (index, hunk) in hunks.iter().enumerate() {
        if hunk.search.is_empty() {
            return Err(HunkError::EmptySearch { index });
        }
        current = replace_first(&current, hunk).ok_or(HunkError::SearchNotFound { index })?;
    }
    Ok(current)
}

fn replace_first(content: &str, hunk: &Hunk) -> Option<String> {
    if hunk.search.is_empty() {
        return None;
    }
    let start = content.find(&hunk.search)?;
    let end = start + hunk.search.len();
    let mut out = String::with_capacity(content.len() + hunk.replace.len());
    out.push_str(&content[..start]);
    out.push_str(&hunk.replace);
    out.push_str(&content[end..]);
    Some(out)
}

/// Normalise multi-line hunk text taken off the wire.
///
/// Strips the indentation shared by every non-blank line, then drops leading and
/// trailing blank lines. Single-line text is returned unchanged.
pub fn normalize_block(raw: &str) -> String {
    if !raw.contains('\n') {
        return raw.to_string();
    }

    let lines: Vec<&str> = raw.split('\n').collect();
    let Some(first) = lines.iter().position(|line| !is_blank(line)) else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !is_blank(line))
        .unwrap_or(first);
    let body = &lines[first..=last];

    let indent = common_indent(body);
    body.iter()
        .map(|&line| match line.strip_prefix(indent) {
            Some(rest) => rest,
            None if is_blank(line) => "",
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

fn common_indent<'a>(lines: &[&'a str]) -> &'a str {
    let mut indent: Option<&str> = None;
    for line in lines.iter().copied().filter(|line| !is_blank(line)) {
        let current = leading_whitespace(line);
        indent = Some(match indent {
            None => current,
            Some(prev) => {
                let shared = prev
                    .bytes()
                    .zip(current.bytes())
                    .take_while(|(a, b)| a == b)
                    .count();
                &prev[..shared]
            }
        });
    }
    indent.unwrap_or("")
}
