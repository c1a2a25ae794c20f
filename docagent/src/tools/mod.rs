//! Tool handlers: each command's behaviour against the collaborators.
//!
//! Flows in [`crate::agents`] compose these into [`crate::dispatch::Cases`].

pub mod complete;
pub mod files;
pub mod proposal;
pub mod retrieval;
pub mod sources;

pub use complete::CompleteTool;
pub use files::FileTools;
pub use proposal::ProposalTools;
pub use retrieval::RetrievalTool;
pub use sources::SourceTool;
