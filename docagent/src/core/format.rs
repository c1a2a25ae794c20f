//! Rendering of final answers into platform markup.

use crate::core::command::{AttemptComplete, Source};

/// Turns an [`AttemptComplete`] into the text delivered to the user.
pub trait ResponseFormatter: Send + Sync {
    fn render(&self, done: &AttemptComplete) -> String;
}

/// Markdown footnotes: `[^id]` markers after each message and a
/// `[^id]: uri` footer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownFormatter;

/// Chat markup: `[id]` markers and `[id] <uri|name>` footer lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlackFormatter;

impl ResponseFormatter for MarkdownFormatter {
    fn render(&self, done: &AttemptComplete) -> String {
        render_with(done, |id| format!("[^{id}]"), |source| {
            format!("[^{}]: {}", source.id, source.uri)
        })
    }
}

impl ResponseFormatter for SlackFormatter {
    fn render(&self, done: &AttemptComplete) -> String {
        render_with(done, |id| format!("[{id}]"), |source| {
            let name = if source.display_name.is_empty() {
                &source.uri
            } else {
                &source.display_name
            };
            format!("[{}] <{}|{}>", source.id, source.uri, name)
        })
    }
}

fn render_with(
    done: &AttemptComplete,
    marker: impl Fn(&str) -> String,
    footer_line: impl Fn(&Source) -> String,
) -> String {
    let body = done
        .messages
        .iter()
        .map(|message| {
            let markers: String = message.source_ids.iter().map(|id| marker(id)).collect();
            format!("{}{markers}", message.text.trim_end())
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let footer: Vec<String> = done
        .sources
        .iter()
        .filter(|source| {
            done.messages
                .iter()
                .any(|message| message.source_ids.contains(&source.id))
        })
        .map(footer_line)
        .collect();

    if footer.is_empty() {
        body
    } else {
        format!("{body}\n\n{}", footer.join("\n"))
    }
}
