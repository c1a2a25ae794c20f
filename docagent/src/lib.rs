//! Orchestration core of a documentation agent.
//!
//! A chat model emits one XML-tagged tool command per turn. The task loop
//! parses it, dispatches it to the handler the current flow wires in, and feeds
//! the observation back until the model completes or the step budget runs out.
//!
//! - **[`core`]**: Pure logic (wire protocol, hunks, diffs, patches, formatting).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Collaborator ports (chat model, files, proposals, retrieval,
//!   sources, channels) and their local adapters.
//!
//! [`dispatch`], [`tools`] and [`task_loop`] form the engine; [`agents`] exposes
//! one entry point per use case.

pub mod agents;
pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod task_loop;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
