//! Proposal tools, guarded on at least one file change in the session.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::command::{CreateProposal, UpdateProposal};
use crate::core::state::TaskState;
use crate::core::types::ProposalContent;
use crate::dispatch::Outcome;
use crate::io::proposal::ProposalStore;

pub const NO_CHANGES: &str =
    "No file changes have been made in this task. Change at least one file before creating or updating a proposal.";

#[derive(Clone)]
pub struct ProposalTools {
    store: Arc<dyn ProposalStore>,
}

impl ProposalTools {
    pub fn new(store: Arc<dyn ProposalStore>) -> Self {
        Self { store }
    }

    /// Create a proposal, or update the one this session already created.
    #[instrument(skip_all, fields(title = %cmd.title))]
    pub async fn create_proposal(
        &self,
        state: &mut TaskState,
        cmd: &CreateProposal,
    ) -> Result<Outcome> {
        if !state.file_changed() {
            return Ok(Outcome::soft_error(NO_CHANGES));
        }
        let content = ProposalContent {
            title: cmd.title.clone(),
            description: cmd.description.clone(),
        };
        if let Some(existing) = state.proposal().cloned() {
            self.store
                .update(&existing, &content)
                .await
                .with_context(|| format!("update proposal {}", existing.id))?;
            return Ok(Outcome::observe(format!(
                "Proposal #{} already existed and was updated: {}",
                existing.id, existing.url
            )));
        }
        let handle = self
            .store
            .create(&content)
            .await
            .context("create proposal")?;
        info!(id = handle.id, "proposal created");
        let observation = format!("Created proposal #{}: {}", handle.id, handle.url);
        state.set_proposal(handle);
        Ok(Outcome::observe(observation))
    }

    #[instrument(skip_all, fields(title = %cmd.title))]
    pub async fn update_proposal(
        &self,
        state: &mut TaskState,
        cmd: &UpdateProposal,
    ) -> Result<Outcome> {
        if !state.file_changed() {
            return Ok(Outcome::soft_error(NO_CHANGES));
        }
        let Some(handle) = state.proposal().cloned() else {
            return Ok(Outcome::soft_error("There is no proposal to update."));
        };
        self.store
            .update(
                &handle,
                &ProposalContent {
                    title: cmd.title.clone(),
                    description: cmd.description.clone(),
                },
            )
            .await
            .with_context(|| format!("update proposal {}", handle.id))?;
        info!(id = handle.id, "proposal updated");
        Ok(Outcome::observe(format!("Updated proposal #{}.", handle.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryProposalStore;

    fn create() -> CreateProposal {
        CreateProposal {
            title: "Docs".to_string(),
            description: "Adds docs.".to_string(),
        }
    }

    #[tokio::test]
    async fn guard_blocks_without_file_changes() {
        let store = Arc::new(MemoryProposalStore::default());
        let tools = ProposalTools::new(store.clone());
        let mut state = TaskState::new(3);

        let created = tools.create_proposal(&mut state, &create()).await.expect("create");
        assert_eq!(created, Outcome::soft_error(NO_CHANGES));
        let updated = tools
            .update_proposal(
                &mut state,
                &UpdateProposal {
                    title: "t".to_string(),
                    description: "d".to_string(),
                },
            )
            .await
            .expect("update");
        assert_eq!(updated, Outcome::soft_error(NO_CHANGES));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn creates_once_then_updates() {
        let store = Arc::new(MemoryProposalStore::default());
        let tools = ProposalTools::new(store.clone());
        let mut state = TaskState::new(3);
        state.mark_file_changed();

        tools.create_proposal(&mut state, &create()).await.expect("create");
        let handle = state.proposal().cloned().expect("handle");
        tools.create_proposal(&mut state, &create()).await.expect("create again");
        assert_eq!(state.proposal(), Some(&handle));
        assert_eq!(store.proposals().len(), 1);
    }
}
