//! Fuzzy application of unified-diff hunks to file content.
//!
//! Each hunk is placed nearest to the line its header names, shifted by the
//! drift of earlier hunks. Placement tries an exact match first, then a
//! whitespace-insensitive one, then drops up to [`MAX_FUZZ`] context lines from
//! each end. Context lines keep the file's own text; only additions come from
//! the patch.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Context lines a hunk may shed at each end while still being placed.
pub const MAX_FUZZ: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("malformed hunk header: {0}")]
    MalformedHunkHeader(String),
    #[error("{path}: hunks {hunks:?} could not be applied")]
    Rejected { path: String, hunks: Vec<usize> },
    #[error("{0}: file not found")]
    MissingFile(String),
}

/// Result of [`apply_patch`]: patched text plus one flag per hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub text: String,
    pub applied: Vec<bool>,
}

impl PatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.applied.iter().all(|applied| *applied)
    }

    /// 1-based numbers of hunks that found no place.
    pub fn rejected(&self) -> Vec<usize> {
        self.applied
            .iter()
            .enumerate()
            .filter(|(_, applied)| !**applied)
            .map(|(idx, _)| idx + 1)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Context,
    Remove,
    Add,
}

#[derive(Debug, Clone)]
struct PatchHunk {
    old_start: usize,
    lines: Vec<(LineKind, String)>,
    new_missing_newline: bool,
}

fn old_side(lines: &[(LineKind, String)]) -> Vec<String> {
    lines
        .iter()
        .filter(|(kind, _)| *kind != LineKind::Add)
        .map(|(_, text)| text.clone())
        .collect()
}

impl PatchHunk {
    fn leading_context(&self) -> usize {
        self.lines
            .iter()
            .take_while(|(kind, _)| *kind == LineKind::Context)
            .count()
    }

    fn trailing_context(&self) -> usize {
        self.lines
            .iter()
            .rev()
            .take_while(|(kind, _)| *kind == LineKind::Context)
            .count()
    }
}

static HUNK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid regex")
});

fn parse_hunks(body: &str) -> Result<Vec<PatchHunk>, PatchError> {
    let mut hunks: Vec<PatchHunk> = Vec::new();
    let mut last_kind = None;

    for raw in body.split_inclusive('\n') {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        if line.starts_with("@@") {
            let caps = HUNK_HEADER_RE
                .captures(line)
                .ok_or_else(|| PatchError::MalformedHunkHeader(line.to_string()))?;
            let old_start = caps[1]
                .parse()
                .map_err(|_| PatchError::MalformedHunkHeader(line.to_string()))?;
            hunks.push(PatchHunk {
                old_start,
                lines: Vec::new(),
                new_missing_newline: false,
            });
            last_kind = None;
            continue;
        }

        let Some(hunk) = hunks.last_mut() else {
            continue;
        };
        let (kind, text) = match line.chars().next() {
            Some('+') => (LineKind::Add, &line[1..]),
            Some('-') => (LineKind::Remove, &line[1..]),
            Some(' ') => (LineKind::Context, &line[1..]),
            Some('\\') => {
                if matches!(last_kind, Some(LineKind::Add | LineKind::Context)) {
                    hunk.new_missing_newline = true;
                }
                continue;
            }
            None => (LineKind::Context, ""),
            Some(_) => continue,
        };
        hunk.lines.push((kind, text.to_string()));
        last_kind = Some(kind);
    }
    Ok(hunks)
}

/// Apply every hunk in `body` to `content`, recording which hunks landed.
pub fn apply_patch(content: &str, body: &str) -> Result<PatchOutcome, PatchError> {
    let hunks = parse_hunks(body)?;

    let (mut lines, mut ends_with_newline) = split_lines(content);
    if content.is_empty() {
        ends_with_newline = true;
    }

    let mut applied = Vec::with_capacity(hunks.len());
    let mut offset: isize = 0;
    for hunk in &hunks {
        match place(&lines, hunk, offset) {
            Some(placement) => {
                let reaches_end = placement.at + placement.old_len + placement.trail >= lines.len();
                let replacement = splice_lines(&lines, hunk, &placement);
                let old_len = placement.old_len;
                let new_len = replacement.len();
                lines.splice(placement.at..placement.at + old_len, replacement);
                offset = placement.at as isize - placement.base as isize + new_len as isize
                    - old_len as isize;
                if reaches_end {
                    ends_with_newline = !hunk.new_missing_newline;
                }
                applied.push(true);
            }
            None => applied.push(false),
        }
    }

    let mut text = lines.join("\n");
    if ends_with_newline && !lines.is_empty() {
        text.push('\n');
    }
    Ok(PatchOutcome { text, applied })
}

fn split_lines(content: &str) -> (Vec<String>, bool) {
    if content.is_empty() {
        return (Vec::new(), false);
    }
    let (body, ends_with_newline) = match content.strip_suffix('\n') {
        Some(body) => (body, true),
        None => (content, false),
    };
    (body.split('\n').map(str::to_string).collect(), ends_with_newline)
}

struct Placement {
    /// Index in the current text where the trimmed hunk starts.
    at: usize,
    /// Index the header predicts, before drift.
    base: usize,
    old_len: usize,
    lead: usize,
    trail: usize,
}

fn place(lines: &[String], hunk: &PatchHunk, offset: isize) -> Option<Placement> {
    let leading = hunk.leading_context();
    let trailing = hunk.trailing_context();
    let full_old = old_side(&hunk.lines).len();

    for fuzz in 0..=MAX_FUZZ {
        let lead = fuzz.min(leading);
        let trail = fuzz.min(trailing);
        if fuzz > 0 && lead == 0 && trail == 0 {
            break;
        }
        if lead + trail >= hunk.lines.len() {
            break;
        }
        let trimmed = &hunk.lines[lead..hunk.lines.len() - trail];
        let old = old_side(trimmed);
        if old.is_empty() && full_old > 0 {
            break;
        }

        let header_index = if full_old == 0 {
            hunk.old_start
        } else {
            hunk.old_start.saturating_sub(1)
        };
        let base = header_index + lead;
        let expected = (base as isize + offset).max(0) as usize;

        for loose in [false, true] {
            if let Some(at) = find_block(lines, &old, expected, loose) {
                return Some(Placement {
                    at,
                    base,
                    old_len: old.len(),
                    lead,
                    trail,
                });
            }
        }
    }
    None
}

fn find_block(lines: &[String], block: &[String], expected: usize, loose: bool) -> Option<usize> {
    if block.is_empty() {
        return Some(expected.min(lines.len()));
    }
    if block.len() > lines.len() {
        return None;
    }
    (0..=lines.len() - block.len())
        .filter(|&start| {
            lines[start..start + block.len()]
                .iter()
                .zip(block)
                .all(|(have, want)| same_line(have, want, loose))
        })
        .min_by_key(|&start| start.abs_diff(expected))
}

fn same_line(have: &str, want: &str, loose: bool) -> bool {
    if loose {
        have.split_whitespace().eq(want.split_whitespace())
    } else {
        have == want
    }
}

fn splice_lines(lines: &[String], hunk: &PatchHunk, placement: &Placement) -> Vec<String> {
    let trimmed = &hunk.lines[placement.lead..hunk.lines.len() - placement.trail];
    let mut cursor = placement.at;
    let mut out = Vec::with_capacity(trimmed.len());
    for (kind, text) in trimmed {
        match kind {
            LineKind::Context => {
                out.push(lines[cursor].clone());
                cursor += 1;
            }
            LineKind::Remove => cursor += 1,
            LineKind::Add => out.push(text.clone()),
        }
    }
    out
}
