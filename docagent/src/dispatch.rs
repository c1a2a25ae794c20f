//! Routes a parsed [`Command`] to the handler a flow wired for it.
//!
//! A flow implements [`Cases`] and overrides only the handlers for its tools.
//! Every other handler falls through to [`DispatchError::HandlerNotImplemented`],
//! which aborts the loop.
//!
//! Handlers return `Ok(Outcome)` for anything the model should see, including
//! soft errors wrapped in `<error>`, and `Err` for failures that end the loop.

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::command::{
    AttemptComplete, Command, CommandKind, CreateFile, CreateProposal, DeleteFile, FindFile,
    FindSource, LinkSources, ModifyFile, QueryRag, RenameFile, UpdateProposal,
};
use crate::core::state::TaskState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no handler wired for <{0}>")]
    HandlerNotImplemented(CommandKind),
}

/// What a handler reports back to the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub observation: String,
    pub terminal: bool,
}

impl Outcome {
    pub fn observe(text: impl Into<String>) -> Self {
        Self {
            observation: text.into(),
            terminal: false,
        }
    }

    /// Model-visible failure the model can recover from.
    pub fn soft_error(message: impl AsRef<str>) -> Self {
        Self::observe(format!("<error>{}</error>", message.as_ref()))
    }

    pub fn terminal(text: impl Into<String>) -> Self {
        Self {
            observation: text.into(),
            terminal: true,
        }
    }

    pub fn is_soft_error(&self) -> bool {
        self.observation.starts_with("<error>")
    }
}

fn not_wired(kind: CommandKind) -> Result<Outcome> {
    Err(DispatchError::HandlerNotImplemented(kind).into())
}

/// One handler slot per command variant.
#[async_trait]
pub trait Cases: Send + Sync {
    /// Commands this flow handles, in the order their usages are listed in the
    /// system prompt.
    fn wired(&self) -> Vec<CommandKind>;

    async fn create_file(&self, _state: &mut TaskState, _cmd: &CreateFile) -> Result<Outcome> {
        not_wired(CommandKind::CreateFile)
    }

    async fn modify_file(&self, _state: &mut TaskState, _cmd: &ModifyFile) -> Result<Outcome> {
        not_wired(CommandKind::ModifyFile)
    }

    async fn rename_file(&self, _state: &mut TaskState, _cmd: &RenameFile) -> Result<Outcome> {
        not_wired(CommandKind::RenameFile)
    }

    async fn delete_file(&self, _state: &mut TaskState, _cmd: &DeleteFile) -> Result<Outcome> {
        not_wired(CommandKind::DeleteFile)
    }

    async fn find_file(&self, _state: &mut TaskState, _cmd: &FindFile) -> Result<Outcome> {
        not_wired(CommandKind::FindFile)
    }

    async fn find_source(&self, _state: &mut TaskState, _cmd: &FindSource) -> Result<Outcome> {
        not_wired(CommandKind::FindSource)
    }

    async fn link_sources(&self, _state: &mut TaskState, _cmd: &LinkSources) -> Result<Outcome> {
        not_wired(CommandKind::LinkSources)
    }

    async fn query_rag(&self, _state: &mut TaskState, _cmd: &QueryRag) -> Result<Outcome> {
        not_wired(CommandKind::QueryRag)
    }

    async fn create_proposal(
        &self,
        _state: &mut TaskState,
        _cmd: &CreateProposal,
    ) -> Result<Outcome> {
        not_wired(CommandKind::CreateProposal)
    }

    async fn update_proposal(
        &self,
        _state: &mut TaskState,
        _cmd: &UpdateProposal,
    ) -> Result<Outcome> {
        not_wired(CommandKind::UpdateProposal)
    }

    async fn attempt_complete(
        &self,
        _state: &mut TaskState,
        _cmd: &AttemptComplete,
    ) -> Result<Outcome> {
        not_wired(CommandKind::AttemptComplete)
    }
}

/// Run the handler for `command` and record a terminal outcome on `state`.
#[instrument(skip_all, fields(command = %command.kind()))]
pub async fn dispatch(command: &Command, cases: &dyn Cases, state: &mut TaskState) -> Result<Outcome> {
    let outcome = match command {
        Command::CreateFile(cmd) => cases.create_file(state, cmd).await,
        Command::ModifyFile(cmd) => cases.modify_file(state, cmd).await,
        Command::RenameFile(cmd) => cases.rename_file(state, cmd).await,
        Command::DeleteFile(cmd) => cases.delete_file(state, cmd).await,
        Command::FindFile(cmd) => cases.find_file(state, cmd).await,
        Command::FindSource(cmd) => cases.find_source(state, cmd).await,
        Command::LinkSources(cmd) => cases.link_sources(state, cmd).await,
        Command::QueryRag(cmd) => cases.query_rag(state, cmd).await,
        Command::CreateProposal(cmd) => cases.create_proposal(state, cmd).await,
        Command::UpdateProposal(cmd) => cases.update_proposal(state, cmd).await,
        Command::AttemptComplete(cmd) => cases.attempt_complete(state, cmd).await,
    }?;
    if outcome.terminal {
        state.mark_terminal();
    }
    debug!(
        terminal = outcome.terminal,
        soft_error = outcome.is_soft_error(),
        "handled"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OnlyFind;

    #[async_trait]
    impl Cases for OnlyFind {
        fn wired(&self) -> Vec<CommandKind> {
            vec![CommandKind::FindFile]
        }

        async fn find_file(&self, _state: &mut TaskState, cmd: &FindFile) -> Result<Outcome> {
            Ok(Outcome::observe(format!("found {}", cmd.path)))
        }
    }

    struct Finisher;

    #[async_trait]
    impl Cases for Finisher {
        fn wired(&self) -> Vec<CommandKind> {
            vec![CommandKind::AttemptComplete]
        }

        async fn attempt_complete(
            &self,
            _state: &mut TaskState,
            _cmd: &AttemptComplete,
        ) -> Result<Outcome> {
            Ok(Outcome::terminal("sent"))
        }
    }

    #[tokio::test]
    async fn routes_to_the_wired_handler() {
        let mut state = TaskState::new(3);
        let command = Command::FindFile(FindFile {
            path: "a.md".to_string(),
        });
        let outcome = dispatch(&command, &OnlyFind, &mut state).await.expect("dispatch");
        assert_eq!(outcome, Outcome::observe("found a.md"));
        assert!(!state.is_terminal());
    }

    #[tokio::test]
    async fn unwired_handler_is_a_typed_error() {
        let mut state = TaskState::new(3);
        let command = Command::QueryRag(QueryRag {
            query: "q".to_string(),
        });
        let err = dispatch(&command, &OnlyFind, &mut state).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<DispatchError>(),
            Some(&DispatchError::HandlerNotImplemented(CommandKind::QueryRag))
        );
    }

    #[tokio::test]
    async fn terminal_outcome_marks_state() {
        let mut state = TaskState::new(3);
        let command = Command::AttemptComplete(AttemptComplete::default());
        let outcome = dispatch(&command, &Finisher, &mut state).await.expect("dispatch");
        assert!(outcome.terminal);
        assert!(state.is_terminal());
    }

    #[test]
    fn soft_errors_are_wrapped() {
        let outcome = Outcome::soft_error("RAG corpus is not set.");
        assert_eq!(outcome.observation, "<error>RAG corpus is not set.</error>");
        assert!(outcome.is_soft_error());
        assert!(!outcome.terminal);
    }
}
