//! Entry points, one per use case.
//!
//! Each flow wires the subset of tools it needs into [`Cases`], renders the
//! system prompt for those tools and drives one task loop. A failed loop
//! sends the configured failure notice through the conversation channel.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::core::command::CommandKind;
use crate::core::format::ResponseFormatter;
use crate::core::state::TaskState;
use crate::core::types::{EnvironmentContext, ThreadMessage};
use crate::core::usage::usage_for;
use crate::dispatch::Cases;
use crate::io::channel::{ConversationChannel, spawn_presence};
use crate::io::chat::ChatModel;
use crate::io::config::AgentConfig;
use crate::io::context::TaskContext;
use crate::io::files::{FileQuery, FileStore};
use crate::io::prompt::{PromptBuilder, PromptInputs};
use crate::io::proposal::ProposalStore;
use crate::io::retrieval::RetrievalIndex;
use crate::io::sources::SourceManager;
use crate::task_loop::{LoopOutcome, StepRecord, run_task_loop};
use crate::tools::{FileTools, RetrievalTool, SourceTool};

pub mod answer;
pub mod generate;
pub mod refine;

pub use answer::{AnswerRequest, answer_question};
pub use generate::{GenerateOutcome, GenerateRequest, generate_proposal};
pub use refine::{RefineRequest, refine_proposal};

/// Collaborators shared by every flow.
#[derive(Clone)]
pub struct AgentDeps {
    pub model: Arc<dyn ChatModel>,
    pub files: Arc<dyn FileQuery>,
    pub store: Arc<dyn FileStore>,
    pub proposals: Arc<dyn ProposalStore>,
    /// `None` when no retrieval index is configured for the workspace.
    pub retrieval: Option<Arc<dyn RetrievalIndex>>,
    pub sources: SourceManager,
    pub formatter: Arc<dyn ResponseFormatter>,
    pub config: AgentConfig,
}

impl AgentDeps {
    fn file_tools(&self) -> FileTools {
        FileTools::new(
            self.files.clone(),
            self.store.clone(),
            self.config.strict_hunks,
        )
    }

    fn source_tool(&self) -> SourceTool {
        SourceTool::new(self.sources.clone())
    }

    fn retrieval_tool(&self) -> RetrievalTool {
        RetrievalTool::new(self.retrieval.clone())
    }
}

/// Per-run hooks a caller may attach.
pub struct RunHooks<'a> {
    pub ctx: TaskContext,
    pub on_step: Box<dyn FnMut(&StepRecord) + Send + 'a>,
}

impl Default for RunHooks<'_> {
    fn default() -> Self {
        Self {
            ctx: TaskContext::new(),
            on_step: Box::new(|_: &StepRecord| {}),
        }
    }
}

/// Inputs to [`drive`] that differ per flow.
pub(crate) struct FlowRun<'a> {
    pub task: &'static str,
    pub cases: &'a dyn Cases,
    pub channel: Arc<dyn ConversationChannel>,
    pub environment: Vec<EnvironmentContext>,
    pub request: &'a str,
    pub state: &'a mut TaskState,
}

/// System prompt a flow would use, without running it.
pub fn system_prompt(
    cases: &dyn Cases,
    task: &str,
    max_steps: usize,
    environment: Vec<EnvironmentContext>,
) -> Result<String> {
    let inputs = PromptInputs {
        task: task.to_string(),
        tools: cases.wired().into_iter().map(usage_for).collect(),
        max_steps,
        environment,
    };
    PromptBuilder::new().build(&inputs)
}

pub(crate) async fn drive(
    deps: &AgentDeps,
    run: FlowRun<'_>,
    hooks: &mut RunHooks<'_>,
) -> Result<LoopOutcome> {
    spawn_presence(run.channel.clone());

    let result = async {
        let prompt = system_prompt(
            run.cases,
            run.task,
            run.state.remaining_steps(),
            run.environment,
        )
        .context("failed to render system prompt")?;
        run_task_loop(
            deps.model.as_ref(),
            &prompt,
            run.cases,
            run.state,
            run.request,
            &hooks.ctx,
            hooks.on_step.as_mut(),
        )
        .await
    }
    .await;

    match result {
        Ok(outcome) => Ok(outcome),
        Err(err) => Err(fail(deps, run.channel.as_ref(), err).await),
    }
}

/// Send the failure notice and label `err` for the caller.
pub(crate) async fn fail(
    deps: &AgentDeps,
    channel: &dyn ConversationChannel,
    err: anyhow::Error,
) -> anyhow::Error {
    if let Err(notice_err) = channel.reply(&deps.config.failure_notice).await {
        warn!(error = %notice_err, "failed to send failure notice");
    }
    err.context("failed to initiate task loop")
}

/// Render a conversation as one environment block.
pub(crate) fn conversation_context(name: &str, messages: &[ThreadMessage]) -> EnvironmentContext {
    let lines: Vec<String> = messages
        .iter()
        .map(|message| match &message.permalink {
            Some(link) => format!("{} ({link}): {}", message.author, message.text),
            None => format!("{}: {}", message.author, message.text),
        })
        .collect();
    EnvironmentContext::new(name, lines.join("\n"))
}

/// Usages in prompt order, skipping `query_rag` when no index is configured.
pub(crate) fn with_retrieval(kinds: &[CommandKind], retrieval: &RetrievalTool) -> Vec<CommandKind> {
    kinds
        .iter()
        .copied()
        .filter(|kind| *kind != CommandKind::QueryRag || retrieval.is_configured())
        .collect()
}
