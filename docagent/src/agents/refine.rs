//! Proposal refinement from review feedback.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::instrument;

use super::{AgentDeps, FlowRun, RunHooks, conversation_context, drive, fail};
use crate::core::command::{
    AttemptComplete, CommandKind, CreateFile, DeleteFile, FindFile, FindSource, LinkSources,
    ModifyFile, RenameFile, UpdateProposal,
};
use crate::core::diff::{Diff, parse_diff};
use crate::core::state::TaskState;
use crate::core::types::{EnvironmentContext, Proposal, ProposalHandle, ThreadMessage};
use crate::dispatch::{Cases, Outcome};
use crate::io::channel::ConversationChannel;
use crate::io::proposal::ProposalThread;
use crate::task_loop::LoopOutcome;
use crate::tools::{CompleteTool, FileTools, ProposalTools, SourceTool};

pub const TASK: &str = "Revise an open documentation proposal according to the \
reviewer's feedback. Inspect the changed files, apply the requested edits with \
the file tools, update the proposal description if the scope changed and finish \
with attempt_complete summarising what you did.";

const TOOLS: &[CommandKind] = &[
    CommandKind::FindFile,
    CommandKind::FindSource,
    CommandKind::CreateFile,
    CommandKind::ModifyFile,
    CommandKind::RenameFile,
    CommandKind::DeleteFile,
    CommandKind::LinkSources,
    CommandKind::UpdateProposal,
    CommandKind::AttemptComplete,
];

pub struct RefineRequest {
    pub proposal: ProposalHandle,
    /// The review comment that asked for changes.
    pub feedback: String,
}

pub struct RefineCases {
    files: FileTools,
    sources: SourceTool,
    proposals: ProposalTools,
    complete: CompleteTool,
}

impl RefineCases {
    pub fn new(deps: &AgentDeps, channel: Arc<dyn ConversationChannel>) -> Self {
        Self {
            files: deps.file_tools(),
            sources: deps.source_tool(),
            proposals: ProposalTools::new(deps.proposals.clone()),
            complete: CompleteTool::new(channel, deps.formatter.clone()),
        }
    }
}

#[async_trait]
impl Cases for RefineCases {
    fn wired(&self) -> Vec<CommandKind> {
        TOOLS.to_vec()
    }

    async fn create_file(&self, state: &mut TaskState, cmd: &CreateFile) -> Result<Outcome> {
        self.files.create_file(state, cmd).await
    }

    async fn modify_file(&self, state: &mut TaskState, cmd: &ModifyFile) -> Result<Outcome> {
        self.files.modify_file(state, cmd).await
    }

    async fn rename_file(&self, state: &mut TaskState, cmd: &RenameFile) -> Result<Outcome> {
        self.files.rename_file(state, cmd).await
    }

    async fn delete_file(&self, state: &mut TaskState, cmd: &DeleteFile) -> Result<Outcome> {
        self.files.delete_file(state, cmd).await
    }

    async fn find_file(&self, _state: &mut TaskState, cmd: &FindFile) -> Result<Outcome> {
        self.files.find_file(cmd).await
    }

    async fn find_source(&self, _state: &mut TaskState, cmd: &FindSource) -> Result<Outcome> {
        self.sources.find_source(cmd).await
    }

    async fn link_sources(&self, _state: &mut TaskState, cmd: &LinkSources) -> Result<Outcome> {
        self.files.link_sources(cmd).await
    }

    async fn update_proposal(
        &self,
        state: &mut TaskState,
        cmd: &UpdateProposal,
    ) -> Result<Outcome> {
        self.proposals.update_proposal(state, cmd).await
    }

    async fn attempt_complete(
        &self,
        _state: &mut TaskState,
        cmd: &AttemptComplete,
    ) -> Result<Outcome> {
        self.complete.attempt_complete(cmd).await
    }
}

/// Refine `request.proposal`; replies land as review comments on it.
#[instrument(skip_all, fields(proposal = request.proposal.id))]
pub async fn refine_proposal(
    deps: &AgentDeps,
    request: RefineRequest,
    hooks: &mut RunHooks<'_>,
) -> Result<LoopOutcome> {
    let channel: Arc<dyn ConversationChannel> = Arc::new(ProposalThread::new(
        deps.proposals.clone(),
        request.proposal.clone(),
    ));
    let cases = RefineCases::new(deps, channel.clone());
    let mut state = TaskState::for_proposal(deps.config.refine_max_steps, request.proposal.clone());

    let proposal = match deps
        .proposals
        .fetch(&request.proposal)
        .await
        .with_context(|| format!("failed to fetch proposal {}", request.proposal.id))
    {
        Ok(proposal) => proposal,
        Err(err) => return Err(fail(deps, channel.as_ref(), err).await),
    };

    drive(
        deps,
        FlowRun {
            task: TASK,
            cases: &cases,
            channel,
            environment: environment(&proposal),
            request: &request.feedback,
            state: &mut state,
        },
        hooks,
    )
    .await
}

fn environment(proposal: &Proposal) -> Vec<EnvironmentContext> {
    let mut environment = vec![EnvironmentContext::new(
        "proposal",
        format!(
            "#{} {}\n{}\n\n{}",
            proposal.handle.id,
            proposal.content.title,
            proposal.handle.url,
            proposal.content.description.trim_end()
        ),
    )];

    let diffs = parse_diff(&proposal.diff);
    if !diffs.is_empty() {
        let lines: Vec<String> = diffs.iter().map(describe_change).collect();
        environment.push(EnvironmentContext::new("changed_files", lines.join("\n")));
    }

    if !proposal.comments.is_empty() {
        let comments: Vec<ThreadMessage> = proposal
            .comments
            .iter()
            .map(|comment| ThreadMessage {
                author: comment.author.clone(),
                text: comment.body.clone(),
                permalink: None,
            })
            .collect();
        environment.push(conversation_context("review_comments", &comments));
    }
    environment
}

fn describe_change(diff: &Diff) -> String {
    if diff.is_new_file {
        format!("added {}", diff.new_path)
    } else if diff.is_deleted {
        format!("deleted {}", diff.old_path)
    } else if diff.is_rename() {
        format!("renamed {} -> {}", diff.old_path, diff.new_path)
    } else {
        format!("modified {}", diff.new_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Comment, ProposalContent};

    #[test]
    fn environment_lists_changed_files_and_comments() {
        let proposal = Proposal {
            handle: ProposalHandle {
                id: 4,
                url: "https://example.com/pr/4".to_string(),
            },
            content: ProposalContent {
                title: "Key rotation".to_string(),
                description: "Documents rotation.\n".to_string(),
            },
            comments: vec![Comment {
                author: "rev".to_string(),
                body: "Mention the admin console.".to_string(),
            }],
            diff: "diff --git a/ops/keys.md b/ops/keys.md\n--- a/ops/keys.md\n+++ b/ops/keys.md\n@@ -1 +1 @@\n-old\n+new\ndiff --git a/new.md b/new.md\nnew file mode 100644\n--- /dev/null\n+++ b/new.md\n@@ -0,0 +1 @@\n+hi\n".to_string(),
        };
        let environment = environment(&proposal);
        let names: Vec<&str> = environment.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, ["proposal", "changed_files", "review_comments"]);
        assert_eq!(environment[0].value, "#4 Key rotation\nhttps://example.com/pr/4\n\nDocuments rotation.");
        assert_eq!(environment[1].value, "modified ops/keys.md\nadded new.md");
        assert_eq!(environment[2].value, "rev: Mention the admin console.");
    }
}
