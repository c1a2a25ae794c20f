//! Step-bounded conversation loop: model reply, parse, dispatch, observe.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::protocol::parse;
use crate::core::state::TaskState;
use crate::dispatch::{Cases, dispatch};
use crate::io::chat::ChatModel;
use crate::io::context::TaskContext;

/// Why [`run_task_loop`] returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStop {
    /// A handler reported a terminal outcome.
    Completed,
    /// The step budget ran out before any terminal outcome.
    BudgetExhausted,
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopOutcome {
    /// Model calls made.
    pub steps: usize,
    pub stop: LoopStop,
}

/// One model round-trip, reported to the `on_step` callback.
///
/// `observation` is `None` when the step failed before a handler produced one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: usize,
    pub request: String,
    pub response: String,
    pub observation: Option<String>,
    pub terminal: bool,
}

/// Drive one task to completion or budget exhaustion.
///
/// Model, parse and dispatch failures end the loop with an error labelled by
/// stage. Cancellation and deadline expiry of `ctx` surface as
/// [`crate::io::context::LoopError`] inside the same labels.
#[instrument(skip_all, fields(budget = state.remaining_steps()))]
pub async fn run_task_loop(
    model: &dyn ChatModel,
    system_prompt: &str,
    cases: &dyn Cases,
    state: &mut TaskState,
    request: &str,
    ctx: &TaskContext,
    on_step: &mut (dyn FnMut(&StepRecord) + Send),
) -> Result<LoopOutcome> {
    if state.remaining_steps() == 0 {
        warn!("task loop started without a step budget");
        return Ok(LoopOutcome {
            steps: 0,
            stop: LoopStop::BudgetExhausted,
        });
    }

    let mut session = ctx
        .run(model.start_session(system_prompt))
        .await
        .context("failed to start chat session")?;

    let mut input = request.to_string();
    let mut steps = 0;
    loop {
        steps += 1;
        let response = ctx
            .run(session.send(&input))
            .await
            .context("failed to generate response")?;

        let command = match parse(&response) {
            Ok(command) => command,
            Err(err) => {
                on_step(&failed_step(steps, input, response));
                return Err(err).context("failed to parse response");
            }
        };
        debug!(step = steps, command = %command.kind(), "dispatching");

        let outcome = match ctx.run(dispatch(&command, cases, state)).await {
            Ok(outcome) => outcome,
            Err(err) => {
                on_step(&failed_step(steps, input, response));
                return Err(err.context("failed to match tool use"));
            }
        };

        on_step(&StepRecord {
            step: steps,
            request: input,
            response,
            observation: Some(outcome.observation.clone()),
            terminal: outcome.terminal,
        });

        if outcome.terminal {
            info!(steps, "task completed");
            return Ok(LoopOutcome {
                steps,
                stop: LoopStop::Completed,
            });
        }

        let remaining = state.consume_step();
        if remaining == 0 {
            warn!(steps, "step budget exhausted before completion");
            return Ok(LoopOutcome {
                steps,
                stop: LoopStop::BudgetExhausted,
            });
        }
        input = format!(
            "{}\n<remaining_steps>{remaining}</remaining_steps>",
            outcome.observation
        );
    }
}

fn failed_step(step: usize, request: String, response: String) -> StepRecord {
    StepRecord {
        step,
        request,
        response,
        observation: None,
        terminal: false,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::core::command::{CommandKind, FindFile};
    use crate::core::protocol::ProtocolError;
    use crate::dispatch::{DispatchError, Outcome};
    use crate::io::chat::ReplayModel;
    use crate::io::context::LoopError;

    const FIND: &str = "<find_file><path>a.md</path></find_file>";
    const DONE: &str = "<attempt_complete><message>ok</message></attempt_complete>";

    struct Echo;

    #[async_trait]
    impl Cases for Echo {
        fn wired(&self) -> Vec<CommandKind> {
            vec![CommandKind::FindFile, CommandKind::AttemptComplete]
        }

        async fn find_file(&self, _state: &mut TaskState, cmd: &FindFile) -> Result<Outcome> {
            Ok(Outcome::observe(format!("saw {}", cmd.path)))
        }

        async fn attempt_complete(
            &self,
            _state: &mut TaskState,
            _cmd: &crate::core::command::AttemptComplete,
        ) -> Result<Outcome> {
            Ok(Outcome::terminal("bye"))
        }
    }

    async fn run(
        model: &ReplayModel,
        budget: usize,
        records: &mut Vec<StepRecord>,
    ) -> Result<LoopOutcome> {
        let mut state = TaskState::new(budget);
        run_task_loop(
            model,
            "system",
            &Echo,
            &mut state,
            "start",
            &TaskContext::new(),
            &mut |record: &StepRecord| records.push(record.clone()),
        )
        .await
    }

    #[tokio::test]
    async fn observations_carry_remaining_steps() {
        let model = ReplayModel::new([FIND, DONE]);
        let mut records = Vec::new();
        let outcome = run(&model, 5, &mut records).await.expect("loop");
        assert_eq!(
            outcome,
            LoopOutcome {
                steps: 2,
                stop: LoopStop::Completed
            }
        );
        assert_eq!(records[0].request, "start");
        assert_eq!(records[1].request, "saw a.md\n<remaining_steps>4</remaining_steps>");
        assert!(records[1].terminal);
    }

    #[tokio::test]
    async fn parse_failure_is_labelled_and_recorded() {
        let model = ReplayModel::new(["I think I am done."]);
        let mut records = Vec::new();
        let err = run(&model, 3, &mut records).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to parse response");
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::MalformedSyntax(_))
        ));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].observation, None);
    }

    #[tokio::test]
    async fn unwired_command_is_labelled() {
        let model = ReplayModel::new(["<query_rag><query>q</query></query_rag>"]);
        let err = run(&model, 3, &mut Vec::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to match tool use");
        assert_eq!(
            err.downcast_ref::<DispatchError>(),
            Some(&DispatchError::HandlerNotImplemented(CommandKind::QueryRag))
        );
    }

    #[tokio::test]
    async fn model_failure_is_labelled() {
        let model = ReplayModel::new(Vec::<String>::new());
        let err = run(&model, 3, &mut Vec::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to generate response");
    }

    #[tokio::test]
    async fn cancelled_context_aborts_before_the_first_call() {
        let model = ReplayModel::new([DONE]);
        let ctx = TaskContext::new();
        ctx.cancel();
        let mut state = TaskState::new(3);
        let err = run_task_loop(&model, "s", &Echo, &mut state, "go", &ctx, &mut |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<LoopError>(), Some(&LoopError::Cancelled));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn zero_budget_makes_no_calls() {
        let model = ReplayModel::new([DONE]);
        let outcome = run(&model, 0, &mut Vec::new()).await.expect("loop");
        assert_eq!(outcome.stop, LoopStop::BudgetExhausted);
        assert_eq!(model.calls(), 0);
    }
}
