//! Structured commands emitted by the model in the tool-use wire format.

use serde::Serialize;

use crate::core::hunk::Hunk;

/// Discriminant of a [`Command`], one per wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    CreateFile,
    ModifyFile,
    RenameFile,
    DeleteFile,
    FindFile,
    FindSource,
    LinkSources,
    QueryRag,
    CreateProposal,
    UpdateProposal,
    AttemptComplete,
}

impl CommandKind {
    pub const ALL: [CommandKind; 11] = [
        CommandKind::CreateFile,
        CommandKind::ModifyFile,
        CommandKind::RenameFile,
        CommandKind::DeleteFile,
        CommandKind::FindFile,
        CommandKind::FindSource,
        CommandKind::LinkSources,
        CommandKind::QueryRag,
        CommandKind::CreateProposal,
        CommandKind::UpdateProposal,
        CommandKind::AttemptComplete,
    ];

    /// Canonical wire tag.
    pub fn tag(self) -> &'static str {
        match self {
            CommandKind::CreateFile => "create_file",
            CommandKind::ModifyFile => "modify_file",
            CommandKind::RenameFile => "rename_file",
            CommandKind::DeleteFile => "delete_file",
            CommandKind::FindFile => "find_file",
            CommandKind::FindSource => "find_source",
            CommandKind::LinkSources => "link_sources",
            CommandKind::QueryRag => "query_rag",
            CommandKind::CreateProposal => "create_proposal",
            CommandKind::UpdateProposal => "update_proposal",
            CommandKind::AttemptComplete => "attempt_complete",
        }
    }

    /// Resolve a wire tag. `add_knowledge_sources` is accepted as an alias of
    /// `link_sources`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        if tag == "add_knowledge_sources" {
            return Some(CommandKind::LinkSources);
        }
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One parsed model instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    CreateFile(CreateFile),
    ModifyFile(ModifyFile),
    RenameFile(RenameFile),
    DeleteFile(DeleteFile),
    FindFile(FindFile),
    FindSource(FindSource),
    LinkSources(LinkSources),
    QueryRag(QueryRag),
    CreateProposal(CreateProposal),
    UpdateProposal(UpdateProposal),
    AttemptComplete(AttemptComplete),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::CreateFile(_) => CommandKind::CreateFile,
            Command::ModifyFile(_) => CommandKind::ModifyFile,
            Command::RenameFile(_) => CommandKind::RenameFile,
            Command::DeleteFile(_) => CommandKind::DeleteFile,
            Command::FindFile(_) => CommandKind::FindFile,
            Command::FindSource(_) => CommandKind::FindSource,
            Command::LinkSources(_) => CommandKind::LinkSources,
            Command::QueryRag(_) => CommandKind::QueryRag,
            Command::CreateProposal(_) => CommandKind::CreateProposal,
            Command::UpdateProposal(_) => CommandKind::UpdateProposal,
            Command::AttemptComplete(_) => CommandKind::AttemptComplete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateFile {
    pub path: String,
    pub content: String,
    pub source_uris: Vec<String>,
}

/// Edit an existing file. `hunks` is never empty once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifyFile {
    pub path: String,
    pub hunks: Vec<Hunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameFile {
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<Hunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFile {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindFile {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindSource {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSources {
    pub file_path: String,
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRag {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateProposal {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateProposal {
    pub title: String,
    pub description: String,
}

/// Final answer of a task. Delivering it ends the loop.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AttemptComplete {
    pub messages: Vec<Message>,
    pub sources: Vec<Source>,
}

/// One reply paragraph. `source_ids` reference [`Source::id`] values; they are
/// not checked against the declared sources when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub text: String,
    pub source_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub id: String,
    pub uri: String,
    pub display_name: String,
}

impl AttemptComplete {
    /// Look up a declared source by id.
    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|source| source.id == id)
    }
}
