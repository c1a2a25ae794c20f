//! Static tool descriptions rendered into the system prompt.

use serde::Serialize;

use crate::core::command::CommandKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// Prompt metadata for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [Parameter],
    pub example: &'static str,
}

const fn required(name: &'static str, description: &'static str) -> Parameter {
    Parameter {
        name,
        description,
        required: true,
    }
}

const fn optional(name: &'static str, description: &'static str) -> Parameter {
    Parameter {
        name,
        description,
        required: false,
    }
}

const CREATE_FILE: Usage = Usage {
    name: "create_file",
    description: "Create a new file in the documentation repository with the given content.",
    parameters: &[
        required("path", "Repository-relative path of the new file."),
        required("content", "Full content of the file."),
        optional(
            "uri",
            "Knowledge source backing the content. Repeat the element for several sources.",
        ),
    ],
    example: "<create_file>\n<path>docs/setup.md</path>\n<content># Setup\n\nInstall the CLI first.\n</content>\n<uri>https://chat.example.com/archives/C01/p1700000000</uri>\n</create_file>",
};

const MODIFY_FILE: Usage = Usage {
    name: "modify_file",
    description: "Edit an existing file. Each hunk replaces the first occurrence of its search text. Search text must match the file exactly; copy it from find_file output.",
    parameters: &[
        required("path", "Repository-relative path of the file."),
        required(
            "hunk",
            "A <search> and <replace> pair. Repeat the element for several edits; they apply in order.",
        ),
    ],
    example: "<modify_file>\n<path>docs/setup.md</path>\n<hunk>\n<search>\nInstall the CLI first.\n</search>\n<replace>\nInstall the CLI first, then log in.\n</replace>\n</hunk>\n</modify_file>",
};

const RENAME_FILE: Usage = Usage {
    name: "rename_file",
    description: "Move a file to a new path, optionally editing it with hunks on the way.",
    parameters: &[
        required("old_path", "Current repository-relative path."),
        required("new_path", "New repository-relative path."),
        optional("hunk", "A <search> and <replace> pair applied to the moved content."),
    ],
    example: "<rename_file>\n<old_path>docs/setup.md</old_path>\n<new_path>docs/getting-started.md</new_path>\n</rename_file>",
};

const DELETE_FILE: Usage = Usage {
    name: "delete_file",
    description: "Delete a file from the documentation repository.",
    parameters: &[required("path", "Repository-relative path of the file.")],
    example: "<delete_file>\n<path>docs/obsolete.md</path>\n</delete_file>",
};

const FIND_FILE: Usage = Usage {
    name: "find_file",
    description: "Read a file from the documentation repository.",
    parameters: &[required("path", "Repository-relative path of the file.")],
    example: "<find_file>\n<path>docs/setup.md</path>\n</find_file>",
};

const FIND_SOURCE: Usage = Usage {
    name: "find_source",
    description: "Fetch the content behind a knowledge source URI such as a conversation or code permalink.",
    parameters: &[required("uri", "Absolute URI of the source.")],
    example: "<find_source>\n<uri>https://github.com/acme/docs/blob/main/docs/setup.md</uri>\n</find_source>",
};

const LINK_SOURCES: Usage = Usage {
    name: "link_sources",
    description: "Attach knowledge sources to an existing file. URIs already attached are skipped. Also accepted as add_knowledge_sources.",
    parameters: &[
        required("path", "Repository-relative path of the file."),
        required("uri", "Source URI. Repeat the element for several sources."),
    ],
    example: "<link_sources>\n<path>docs/setup.md</path>\n<uri>https://chat.example.com/archives/C01/p1700000000</uri>\n</link_sources>",
};

const QUERY_RAG: Usage = Usage {
    name: "query_rag",
    description: "Search the retrieval index for passages relevant to a question.",
    parameters: &[required("query", "Natural-language search query.")],
    example: "<query_rag>\n<query>How do I rotate API keys?</query>\n</query_rag>",
};

const CREATE_PROPOSAL: Usage = Usage {
    name: "create_proposal",
    description: "Open a proposal (pull request) with the file changes made so far. Only valid after at least one file change.",
    parameters: &[
        required("title", "Short title of the proposal."),
        required("description", "What changed and why."),
    ],
    example: "<create_proposal>\n<title>Document API key rotation</title>\n<description>Adds a rotation guide based on the support thread.</description>\n</create_proposal>",
};

const UPDATE_PROPOSAL: Usage = Usage {
    name: "update_proposal",
    description: "Update the title and description of the proposal under review. Only valid after at least one file change.",
    parameters: &[
        required("title", "New title."),
        required("description", "New description."),
    ],
    example: "<update_proposal>\n<title>Document API key rotation</title>\n<description>Addresses review feedback on wording.</description>\n</update_proposal>",
};

const ATTEMPT_COMPLETE: Usage = Usage {
    name: "attempt_complete",
    description: "Finish the task and reply to the user. Cite sources by id in the message source attribute.",
    parameters: &[
        required("message", "Reply paragraph. Optional source attribute: comma-separated source ids."),
        optional("source", "Cited source with id and uri attributes; the element text is its display name."),
    ],
    example: "<attempt_complete>\n<message source=\"1\">Keys are rotated from the admin console.</message>\n<source id=\"1\" uri=\"https://github.com/acme/docs/blob/main/docs/keys.md\">Key management</source>\n</attempt_complete>",
};

/// Usage metadata for a command kind.
pub fn usage_for(kind: CommandKind) -> &'static Usage {
    match kind {
        CommandKind::CreateFile => &CREATE_FILE,
        CommandKind::ModifyFile => &MODIFY_FILE,
        CommandKind::RenameFile => &RENAME_FILE,
        CommandKind::DeleteFile => &DELETE_FILE,
        CommandKind::FindFile => &FIND_FILE,
        CommandKind::FindSource => &FIND_SOURCE,
        CommandKind::LinkSources => &LINK_SOURCES,
        CommandKind::QueryRag => &QUERY_RAG,
        CommandKind::CreateProposal => &CREATE_PROPOSAL,
        CommandKind::UpdateProposal => &UPDATE_PROPOSAL,
        CommandKind::AttemptComplete => &ATTEMPT_COMPLETE,
    }
}

/// Render usages in the given order, one block per tool.
pub fn render_usages(usages: &[&Usage]) -> String {
    usages
        .iter()
        .map(|usage| render_usage(usage))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_usage(usage: &Usage) -> String {
    let mut buf = format!("## {}\nDescription: {}\nParameters:\n", usage.name, usage.description);
    for param in usage.parameters {
        let flag = if param.required { "required" } else { "optional" };
        buf.push_str(&format!("- {}: ({flag}) {}\n", param.name, param.description));
    }
    buf.push_str("Usage:\n");
    buf.push_str(usage.example);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::parse;

    #[test]
    fn render_preserves_order_and_annotates_parameters() {
        let rendered = render_usages(&[
            usage_for(CommandKind::FindFile),
            usage_for(CommandKind::CreateFile),
        ]);
        let find = rendered.find("## find_file").expect("find_file block");
        let create = rendered.find("## create_file").expect("create_file block");
        assert!(find < create);
        assert!(rendered.contains("- path: (required) Repository-relative path of the file."));
        assert!(rendered.contains("- uri: (optional)"));
    }

    #[test]
    fn render_is_deterministic() {
        let usages: Vec<&Usage> = CommandKind::ALL.into_iter().map(usage_for).collect();
        assert_eq!(render_usages(&usages), render_usages(&usages));
    }

    #[test]
    fn examples_parse_as_their_own_command() {
        for kind in CommandKind::ALL {
            let usage = usage_for(kind);
            assert_eq!(usage.name, kind.tag());
            let command = parse(usage.example)
                .unwrap_or_else(|err| panic!("{} example does not parse: {err}", usage.name));
            assert_eq!(command.kind(), kind);
        }
    }
}
