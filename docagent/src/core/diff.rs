//! Line-oriented scanner splitting multi-file unified diffs into per-file
//! records. Malformed input yields malformed records, never an error.

use serde::Serialize;

/// One file's worth of a unified diff.
///
/// `old_path` is empty exactly when `is_new_file` is set. `body` holds the
/// hunk headers and hunk lines verbatim, newlines included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub old_path: String,
    pub new_path: String,
    pub body: String,
    pub is_new_file: bool,
    pub is_deleted: bool,
}

impl Diff {
    pub fn is_rename(&self) -> bool {
        !self.is_new_file && !self.old_path.is_empty() && self.old_path != self.new_path
    }

    /// The path this record leaves behind in the tree.
    pub fn path(&self) -> &str {
        if self.is_deleted {
            &self.old_path
        } else {
            &self.new_path
        }
    }
}

/// Split diff text into one record per `diff --git` header, in order.
pub fn parse_diff(text: &str) -> Vec<Diff> {
    let mut diffs = Vec::new();
    let mut current: Option<Diff> = None;
    let mut in_hunks = false;

    for line in text.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);

        if let Some(rest) = bare.strip_prefix("diff --git ") {
            if let Some(done) = current.take() {
                diffs.push(done);
            }
            let (old_path, new_path) = split_header_paths(rest);
            current = Some(Diff {
                old_path,
                new_path,
                ..Diff::default()
            });
            in_hunks = false;
            continue;
        }

        let Some(diff) = current.as_mut() else {
            continue;
        };

        if bare.starts_with("@@") {
            in_hunks = true;
            diff.body.push_str(line);
            continue;
        }

        if in_hunks {
            if is_hunk_line(bare) {
                diff.body.push_str(line);
            }
            continue;
        }

        if bare.starts_with("new file mode") {
            diff.old_path.clear();
            diff.is_new_file = true;
        } else if bare.starts_with("deleted file mode") {
            diff.is_deleted = true;
        } else if let Some(path) = bare.strip_prefix("rename from ") {
            diff.old_path = unquote(path);
        } else if let Some(path) = bare.strip_prefix("rename to ") {
            diff.new_path = unquote(path);
        }
    }

    if let Some(done) = current {
        diffs.push(done);
    }
    diffs
}

fn is_hunk_line(line: &str) -> bool {
    line.is_empty() || line.starts_with(['+', '-', ' ', '\\'])
}

/// Split `a/X b/Y` (either side possibly C-quoted) into `(X, Y)`.
fn split_header_paths(rest: &str) -> (String, String) {
    let (old_raw, new_raw) = if rest.starts_with('"') {
        match quoted_end(rest) {
            Some(end) => (&rest[..end], rest[end..].trim_start()),
            None => (rest, ""),
        }
    } else if let Some(idx) = rest.find(" \"b/") {
        (&rest[..idx], &rest[idx + 1..])
    } else if let Some(idx) = rest.find(" b/") {
        (&rest[..idx], &rest[idx + 1..])
    } else {
        (rest, rest)
    };

    let old_path = unquote(old_raw);
    let new_path = unquote(new_raw);
    (
        old_path.strip_prefix("a/").unwrap_or(&old_path).to_string(),
        new_path.strip_prefix("b/").unwrap_or(&new_path).to_string(),
    )
}

/// Byte offset just past the closing quote of a C-quoted string.
fn quoted_end(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, ch) in text.char_indices().skip(1) {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(idx + 1),
            _ => {}
        }
    }
    None
}

/// Decode a git C-quoted path (octal byte escapes included). Unquoted input is
/// returned as is.
fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    let bytes = inner.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let byte = bytes[idx];
        if byte != b'\\' || idx + 1 >= bytes.len() {
            out.push(byte);
            idx += 1;
            continue;
        }
        let next = bytes[idx + 1];
        match next {
            b'0'..=b'7' => {
                let digits = bytes[idx + 1..]
                    .iter()
                    .take(3)
                    .take_while(|b| (b'0'..=b'7').contains(*b))
                    .count();
                let value = bytes[idx + 1..idx + 1 + digits]
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                out.push(u8::try_from(value).unwrap_or(b'?'));
                idx += 1 + digits;
            }
            _ => {
                out.push(match next {
                    b'n' => b'\n',
                    b't' => b'\t',
                    b'r' => b'\r',
                    b'a' => 0x07,
                    b'b' => 0x08,
                    b'f' => 0x0c,
                    b'v' => 0x0b,
                    other => other,
                });
                idx += 2;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_edit() {
        let text = "diff --git a/file1.txt b/file1.txt\nindex 83db48f..bf269f4 100644\n--- a/file1.txt\n+++ b/file1.txt\n@@ -1,3 +1,3 @@\n-Hello\n+Hi\n World\n";
        assert_eq!(
            parse_diff(text),
            vec![Diff {
                old_path: "file1.txt".to_string(),
                new_path: "file1.txt".to_string(),
                body: "@@ -1,3 +1,3 @@\n-Hello\n+Hi\n World\n".to_string(),
                is_new_file: false,
                is_deleted: false,
            }]
        );
    }

    #[test]
    fn multi_file_with_new_file_and_quoted_unicode_name() {
        let text = concat!(
            "diff --git a/docs/a.md b/docs/a.md\n",
            "index 1111111..2222222 100644\n",
            "--- a/docs/a.md\n",
            "+++ b/docs/a.md\n",
            "@@ -1,2 +1,2 @@\n",
            " # A\n",
            "-old\n",
            "+new\n",
            "diff --git a/docs/new.md b/docs/new.md\n",
            "new file mode 100644\n",
            "index 0000000..3333333\n",
            "--- /dev/null\n",
            "+++ b/docs/new.md\n",
            "@@ -0,0 +1,2 @@\n",
            "+# New\n",
            "+body\n",
            "diff --git \"a/docs/\\346\\227\\245\\346\\234\\254.md\" \"b/docs/\\346\\227\\245\\346\\234\\254.md\"\n",
            "index 4444444..5555555 100644\n",
            "--- \"a/docs/\\346\\227\\245\\346\\234\\254.md\"\n",
            "+++ \"b/docs/\\346\\227\\245\\346\\234\\254.md\"\n",
            "@@ -1 +1 @@\n",
            "-x\n",
            "+y\n",
            "\\ No newline at end of file\n",
        );
        let diffs = parse_diff(text);
        assert_eq!(diffs.len(), 3);

        assert_eq!(diffs[0].new_path, "docs/a.md");
        assert!(!diffs[0].is_new_file);
        assert_eq!(diffs[0].body, "@@ -1,2 +1,2 @@\n # A\n-old\n+new\n");

        assert_eq!(diffs[1].old_path, "");
        assert_eq!(diffs[1].new_path, "docs/new.md");
        assert!(diffs[1].is_new_file);
        assert_eq!(diffs[1].body, "@@ -0,0 +1,2 @@\n+# New\n+body\n");

        assert_eq!(diffs[2].old_path, "docs/日本.md");
        assert_eq!(diffs[2].new_path, "docs/日本.md");
        assert!(!diffs[2].is_new_file);
        assert!(diffs[2].body.ends_with("+y\n\\ No newline at end of file\n"));
        assert!(!diffs.iter().any(|d| d.body.contains("diff --git")));
    }

    #[test]
    fn rename_and_delete_headers() {
        let text = concat!(
            "diff --git a/old name.md b/new name.md\n",
            "similarity index 90%\n",
            "rename from old name.md\n",
            "rename to new name.md\n",
            "@@ -1 +1 @@\n",
            "-a\n",
            "+b\n",
            "diff --git a/gone.md b/gone.md\n",
            "deleted file mode 100644\n",
            "--- a/gone.md\n",
            "+++ /dev/null\n",
            "@@ -1 +0,0 @@\n",
            "-bye\n",
        );
        let diffs = parse_diff(text);
        assert_eq!(diffs[0].old_path, "old name.md");
        assert_eq!(diffs[0].new_path, "new name.md");
        assert!(diffs[0].is_rename());
        assert!(diffs[1].is_deleted);
        assert_eq!(diffs[1].path(), "gone.md");
    }

    #[test]
    fn text_without_headers_yields_nothing() {
        assert!(parse_diff("@@ -1 +1 @@\n-a\n+b\n").is_empty());
        assert!(parse_diff("").is_empty());
    }

    #[test]
    fn unquote_decodes_escapes() {
        assert_eq!(unquote("\"a\\tb\\\"c\""), "a\tb\"c");
        assert_eq!(unquote("plain"), "plain");
    }
}
