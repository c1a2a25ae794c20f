//! Tool-use protocol codec: model text to [`Command`] and back.
//!
//! One root element per model turn. The element's local name selects the
//! command, child elements carry parameters (repeated for list parameters) and
//! attributes carry message/source references inside `attempt_complete`.

use thiserror::Error;

use crate::core::command::{
    AttemptComplete, Command, CommandKind, CreateFile, CreateProposal, DeleteFile, FindFile,
    FindSource, LinkSources, Message, ModifyFile, QueryRag, RenameFile, Source, UpdateProposal,
};
use crate::core::hunk::{Hunk, normalize_block};
use crate::core::xml::{Element, escape, first_start_tag, read_element};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown command <{0}>")]
    UnknownCommand(String),
    #[error("malformed syntax: {0}")]
    MalformedSyntax(String),
    #[error("modify_file requires at least one hunk")]
    EmptyHunks,
    #[error("<{command}> is missing <{field}>")]
    MissingField {
        command: CommandKind,
        field: &'static str,
    },
}

/// Parse the first command element found in `text`.
pub fn parse(text: &str) -> Result<Command, ProtocolError> {
    let (offset, tag) = first_start_tag(text)
        .ok_or_else(|| ProtocolError::MalformedSyntax("no command element found".to_string()))?;
    let kind =
        CommandKind::from_tag(tag).ok_or_else(|| ProtocolError::UnknownCommand(tag.to_string()))?;
    let root = read_element(text, offset).map_err(ProtocolError::MalformedSyntax)?;
    let fields = Fields { kind, root: &root };

    let command = match kind {
        CommandKind::CreateFile => Command::CreateFile(CreateFile {
            path: fields.path("path")?,
            content: fields.verbatim("content")?,
            source_uris: fields.list("uri"),
        }),
        CommandKind::ModifyFile => {
            let hunks = fields.hunks()?;
            if hunks.is_empty() {
                return Err(ProtocolError::EmptyHunks);
            }
            Command::ModifyFile(ModifyFile {
                path: fields.path("path")?,
                hunks,
            })
        }
        CommandKind::RenameFile => Command::RenameFile(RenameFile {
            old_path: fields.path("old_path")?,
            new_path: fields.path("new_path")?,
            hunks: fields.hunks()?,
        }),
        CommandKind::DeleteFile => Command::DeleteFile(DeleteFile {
            path: fields.path("path")?,
        }),
        CommandKind::FindFile => Command::FindFile(FindFile {
            path: fields.path("path")?,
        }),
        CommandKind::FindSource => Command::FindSource(FindSource {
            uri: fields.scalar("uri")?,
        }),
        CommandKind::LinkSources => Command::LinkSources(LinkSources {
            file_path: fields.path("path")?,
            uris: fields.list("uri"),
        }),
        CommandKind::QueryRag => Command::QueryRag(QueryRag {
            query: fields.scalar("query")?,
        }),
        CommandKind::CreateProposal => Command::CreateProposal(CreateProposal {
            title: fields.scalar("title")?,
            description: fields.scalar("description")?,
        }),
        CommandKind::UpdateProposal => Command::UpdateProposal(UpdateProposal {
            title: fields.scalar("title")?,
            description: fields.scalar("description")?,
        }),
        CommandKind::AttemptComplete => Command::AttemptComplete(fields.attempt_complete()?),
    };
    Ok(command)
}

struct Fields<'a> {
    kind: CommandKind,
    root: &'a Element,
}

impl Fields<'_> {
    fn required(&self, field: &'static str) -> Result<&Element, ProtocolError> {
        self.root
            .child(field)
            .ok_or(ProtocolError::MissingField {
                command: self.kind,
                field,
            })
    }

    fn verbatim(&self, field: &'static str) -> Result<String, ProtocolError> {
        Ok(self.required(field)?.text.clone())
    }

    fn scalar(&self, field: &'static str) -> Result<String, ProtocolError> {
        Ok(self.required(field)?.text.trim().to_string())
    }

    fn path(&self, field: &'static str) -> Result<String, ProtocolError> {
        Ok(strip_leading_slashes(&self.scalar(field)?))
    }

    fn list(&self, field: &'static str) -> Vec<String> {
        self.root
            .children_named(field)
            .map(|child| child.text.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }

    fn hunks(&self) -> Result<Vec<Hunk>, ProtocolError> {
        self.root
            .children_named("hunk")
            .map(|hunk| -> Result<Hunk, ProtocolError> {
                let search = hunk.child("search").ok_or(ProtocolError::MissingField {
                    command: self.kind,
                    field: "search",
                })?;
                let replace = hunk.child("replace").ok_or(ProtocolError::MissingField {
                    command: self.kind,
                    field: "replace",
                })?;
                Ok(Hunk::new(
                    normalize_block(&search.text),
                    normalize_block(&replace.text),
                ))
            })
            .collect()
    }

    fn attempt_complete(&self) -> Result<AttemptComplete, ProtocolError> {
        let messages = self
            .root
            .children_named("message")
            .map(|message| Message {
                text: message.text.clone(),
                source_ids: message.attr("source").map(split_ids).unwrap_or_default(),
            })
            .collect();

        let sources = self
            .root
            .children_named("source")
            .map(|source| -> Result<Source, ProtocolError> {
                let id = source.attr("id").ok_or(ProtocolError::MissingField {
                    command: self.kind,
                    field: "id",
                })?;
                let uri = source.attr("uri").ok_or(ProtocolError::MissingField {
                    command: self.kind,
                    field: "uri",
                })?;
                Ok(Source {
                    id: id.trim().to_string(),
                    uri: uri.trim().to_string(),
                    display_name: source.text.trim().to_string(),
                })
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;

        Ok(AttemptComplete { messages, sources })
    }
}

fn strip_leading_slashes(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render a command in the wire format. `parse(&render(cmd)) == cmd` for any
/// command whose text fields are already in parsed (normalised) form.
pub fn render(command: &Command) -> String {
    let mut out = Writer::new(command.kind());
    match command {
        Command::CreateFile(cmd) => {
            out.field("path", &cmd.path);
            out.field("content", &cmd.content);
            for uri in &cmd.source_uris {
                out.field("uri", uri);
            }
        }
        Command::ModifyFile(cmd) => {
            out.field("path", &cmd.path);
            out.hunks(&cmd.hunks);
        }
        Command::RenameFile(cmd) => {
            out.field("old_path", &cmd.old_path);
            out.field("new_path", &cmd.new_path);
            out.hunks(&cmd.hunks);
        }
        Command::DeleteFile(DeleteFile { path }) | Command::FindFile(FindFile { path }) => {
            out.field("path", path);
        }
        Command::FindSource(cmd) => out.field("uri", &cmd.uri),
        Command::LinkSources(cmd) => {
            out.field("path", &cmd.file_path);
            for uri in &cmd.uris {
                out.field("uri", uri);
            }
        }
        Command::QueryRag(cmd) => out.field("query", &cmd.query),
        Command::CreateProposal(CreateProposal { title, description })
        | Command::UpdateProposal(UpdateProposal { title, description }) => {
            out.field("title", title);
            out.field("description", description);
        }
        Command::AttemptComplete(cmd) => {
            for message in &cmd.messages {
                out.message(message);
            }
            for source in &cmd.sources {
                out.source(source);
            }
        }
    }
    out.finish()
}

struct Writer {
    tag: &'static str,
    buf: String,
}

impl Writer {
    fn new(kind: CommandKind) -> Self {
        let tag = kind.tag();
        Self {
            tag,
            buf: format!("<{tag}>\n"),
        }
    }

    fn field(&mut self, name: &str, value: &str) {
        self.buf
            .push_str(&format!("<{name}>{}</{name}>\n", escape(value)));
    }

    /// Multi-line hunk text goes on its own lines; parsing strips the added
    /// line breaks again.
    fn block(&mut self, name: &str, value: &str) {
        if value.contains('\n') {
            self.buf
                .push_str(&format!("<{name}>\n{}\n</{name}>\n", escape(value)));
        } else {
            self.field(name, value);
        }
    }

    fn hunks(&mut self, hunks: &[Hunk]) {
        for hunk in hunks {
            self.buf.push_str("<hunk>\n");
            self.block("search", &hunk.search);
            self.block("replace", &hunk.replace);
            self.buf.push_str("</hunk>\n");
        }
    }

    fn message(&mut self, message: &Message) {
        if message.source_ids.is_empty() {
            self.buf
                .push_str(&format!("<message>{}</message>\n", escape(&message.text)));
        } else {
            self.buf.push_str(&format!(
                "<message source=\"{}\">{}</message>\n",
                escape(&message.source_ids.join(",")),
                escape(&message.text)
            ));
        }
    }

    fn source(&mut self, source: &Source) {
        self.buf.push_str(&format!(
            "<source id=\"{}\" uri=\"{}\">{}</source>\n",
            escape(&source.id),
            escape(&source.uri),
            escape(&source.display_name)
        ));
    }

    fn finish(mut self) -> String {
        self.buf.push_str(&format!("</{}>", self.tag));
        self.buf
    }
}
