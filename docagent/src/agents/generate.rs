//! Proposal generation from a conversation.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument};

use super::{AgentDeps, FlowRun, RunHooks, conversation_context, drive, fail, with_retrieval};
use crate::core::command::{
    AttemptComplete, CommandKind, CreateFile, CreateProposal, DeleteFile, FindFile, FindSource,
    LinkSources, ModifyFile, QueryRag, RenameFile,
};
use crate::core::state::TaskState;
use crate::core::types::{EnvironmentContext, ProposalHandle};
use crate::dispatch::{Cases, Outcome};
use crate::io::channel::ConversationChannel;
use crate::task_loop::LoopOutcome;
use crate::tools::{CompleteTool, FileTools, ProposalTools, RetrievalTool, SourceTool};

pub const TASK: &str = "Turn the conversation into a documentation change. \
Find the files that should change, edit or create them with the file tools, \
link the knowledge sources that back each change, open a proposal with \
create_proposal and finish with attempt_complete describing what you changed.";

const TOOLS: &[CommandKind] = &[
    CommandKind::FindFile,
    CommandKind::FindSource,
    CommandKind::QueryRag,
    CommandKind::CreateFile,
    CommandKind::ModifyFile,
    CommandKind::RenameFile,
    CommandKind::DeleteFile,
    CommandKind::LinkSources,
    CommandKind::CreateProposal,
    CommandKind::AttemptComplete,
];

pub struct GenerateRequest {
    /// What the user asked for, usually the message that invoked the agent.
    pub instruction: String,
    pub channel: Arc<dyn ConversationChannel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateOutcome {
    pub run: LoopOutcome,
    /// Proposal created during the run, if the model got that far.
    pub proposal: Option<ProposalHandle>,
}

pub struct GenerateCases {
    files: FileTools,
    sources: SourceTool,
    retrieval: RetrievalTool,
    proposals: ProposalTools,
    complete: CompleteTool,
}

impl GenerateCases {
    pub fn new(deps: &AgentDeps, channel: Arc<dyn ConversationChannel>) -> Self {
        Self {
            files: deps.file_tools(),
            sources: deps.source_tool(),
            retrieval: deps.retrieval_tool(),
            proposals: ProposalTools::new(deps.proposals.clone()),
            complete: CompleteTool::new(channel, deps.formatter.clone()),
        }
    }
}

#[async_trait]
impl Cases for GenerateCases {
    fn wired(&self) -> Vec<CommandKind> {
        with_retrieval(TOOLS, &self.retrieval)
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

    async fn query_rag(&self, _state: &mut TaskState, cmd: &QueryRag) -> Result<Outcome> {
        self.retrieval.query_rag(cmd).await
    }

    async fn create_proposal(
        &self,
        state: &mut TaskState,
        cmd: &CreateProposal,
    ) -> Result<Outcome> {
        self.proposals.create_proposal(state, cmd).await
    }

    async fn attempt_complete(
        &self,
        _state: &mut TaskState,
        cmd: &AttemptComplete,
    ) -> Result<Outcome> {
        self.complete.attempt_complete(cmd).await
    }
}

/// Generate a proposal from the conversation on `request.channel`.
#[instrument(skip_all)]
pub async fn generate_proposal(
    deps: &AgentDeps,
    request: GenerateRequest,
    hooks: &mut RunHooks<'_>,
) -> Result<GenerateOutcome> {
    let cases = GenerateCases::new(deps, request.channel.clone());
    let mut state = TaskState::new(deps.config.generate_max_steps);

    let environment = match environment(deps, request.channel.as_ref()).await {
        Ok(environment) => environment,
        Err(err) => return Err(fail(deps, request.channel.as_ref(), err).await),
    };

    let run = drive(
        deps,
        FlowRun {
            task: TASK,
            cases: &cases,
            channel: request.channel,
            environment,
            request: &request.instruction,
            state: &mut state,
        },
        hooks,
    )
    .await?;

    let proposal = state.take_proposal();
    if let Some(handle) = &proposal {
        info!(id = handle.id, url = %handle.url, "proposal generated");
    }
    Ok(GenerateOutcome { run, proposal })
}

async fn environment(
    deps: &AgentDeps,
    channel: &dyn ConversationChannel,
) -> Result<Vec<EnvironmentContext>> {
    let history = channel
        .history()
        .await
        .map_err(|err| err.context("failed to fetch conversation history"))?;
    let tree = deps
        .files
        .list_tree()
        .await
        .map_err(|err| err.context("failed to list repository tree"))?;

    let mut environment = Vec::new();
    if !history.is_empty() {
        environment.push(conversation_context("conversation", &history));
    }
    environment.push(EnvironmentContext::new("repository_files", tree.join("\n")));
    Ok(environment)
}
