//! Conversational question answering.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::instrument;

use super::{AgentDeps, FlowRun, RunHooks, conversation_context, drive, fail, with_retrieval};
use crate::core::command::{AttemptComplete, CommandKind, FindFile, FindSource, QueryRag};
use crate::core::state::TaskState;
use crate::dispatch::{Cases, Outcome};
use crate::io::channel::ConversationChannel;
use crate::task_loop::LoopOutcome;
use crate::tools::{CompleteTool, FileTools, RetrievalTool, SourceTool};

pub const TASK: &str = "Answer the user's question about the documentation. \
Look up files, knowledge sources and the retrieval index as needed, then reply \
with attempt_complete, citing the sources you relied on.";

const TOOLS: &[CommandKind] = &[
    CommandKind::FindFile,
    CommandKind::FindSource,
    CommandKind::QueryRag,
    CommandKind::AttemptComplete,
];

pub struct AnswerRequest {
    pub question: String,
    pub channel: Arc<dyn ConversationChannel>,
}

pub struct AnswerCases {
    files: FileTools,
    sources: SourceTool,
    retrieval: RetrievalTool,
    complete: CompleteTool,
}

impl AnswerCases {
    pub fn new(deps: &AgentDeps, channel: Arc<dyn ConversationChannel>) -> Self {
        Self {
            files: deps.file_tools(),
            sources: deps.source_tool(),
            retrieval: deps.retrieval_tool(),
            complete: CompleteTool::new(channel, deps.formatter.clone()),
        }
    }
}

#[async_trait]
impl Cases for AnswerCases {
    fn wired(&self) -> Vec<CommandKind> {
        with_retrieval(TOOLS, &self.retrieval)
    }

    async fn find_file(&self, _state: &mut TaskState, cmd: &FindFile) -> Result<Outcome> {
        self.files.find_file(cmd).await
    }

    async fn find_source(&self, _state: &mut TaskState, cmd: &FindSource) -> Result<Outcome> {
        self.sources.find_source(cmd).await
    }

    // Answers with a soft error when no index is configured.
    async fn query_rag(&self, _state: &mut TaskState, cmd: &QueryRag) -> Result<Outcome> {
        self.retrieval.query_rag(cmd).await
    }

    async fn attempt_complete(
        &self,
        _state: &mut TaskState,
        cmd: &AttemptComplete,
    ) -> Result<Outcome> {
        self.complete.attempt_complete(cmd).await
    }
}

/// Answer `request.question`, replying through `request.channel`.
#[instrument(skip_all)]
pub async fn answer_question(
    deps: &AgentDeps,
    request: AnswerRequest,
    hooks: &mut RunHooks<'_>,
) -> Result<LoopOutcome> {
    let cases = AnswerCases::new(deps, request.channel.clone());
    let mut state = TaskState::new(deps.config.answer_max_steps);
    let history = match request.channel.history().await {
        Ok(messages) => messages,
        Err(err) => {
            let err = err.context("failed to fetch conversation history");
            return Err(fail(deps, request.channel.as_ref(), err).await);
        }
    };
    let mut environment = Vec::new();
    if !history.is_empty() {
        environment.push(conversation_context("conversation", &history));
    }
    drive(
        deps,
        FlowRun {
            task: TASK,
            cases: &cases,
            channel: request.channel,
            environment,
            request: &request.question,
            state: &mut state,
        },
        hooks,
    )
    .await
}
