//! Per-invocation task loop session state.

use crate::core::types::ProposalHandle;

/// Mutable state of one task loop, handed to tool handlers by `&mut`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskState {
    remaining_steps: usize,
    file_changed: bool,
    terminal: bool,
    proposal: Option<ProposalHandle>,
}

impl TaskState {
    pub fn new(max_steps: usize) -> Self {
        Self {
            remaining_steps: max_steps,
            file_changed: false,
            terminal: false,
            proposal: None,
        }
    }

    /// State for refining an existing proposal.
    pub fn for_proposal(max_steps: usize, proposal: ProposalHandle) -> Self {
        Self {
            proposal: Some(proposal),
            ..Self::new(max_steps)
        }
    }

    pub fn remaining_steps(&self) -> usize {
        self.remaining_steps
    }

    /// Consume one step and return what is left.
    pub fn consume_step(&mut self) -> usize {
        self.remaining_steps = self.remaining_steps.saturating_sub(1);
        self.remaining_steps
    }

    pub fn file_changed(&self) -> bool {
        self.file_changed
    }

    pub fn mark_file_changed(&mut self) {
        self.file_changed = true;
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn mark_terminal(&mut self) {
        self.terminal = true;
    }

    pub fn proposal(&self) -> Option<&ProposalHandle> {
        self.proposal.as_ref()
    }

    pub fn set_proposal(&mut self, handle: ProposalHandle) {
        self.proposal = Some(handle);
    }

    pub fn take_proposal(&mut self) -> Option<ProposalHandle> {
        self.proposal.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_never_go_below_zero() {
        let mut state = TaskState::new(1);
        assert_eq!(state.consume_step(), 0);
        assert_eq!(state.consume_step(), 0);
    }

    #[test]
    fn flags_start_clear() {
        let state = TaskState::new(3);
        assert!(!state.file_changed());
        assert!(!state.is_terminal());
        assert!(state.proposal().is_none());
    }
}
