//! Deterministic, pure logic shared by the agent core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! text and return deterministic outputs suitable for tests.

pub mod command;
pub mod diff;
pub mod format;
pub mod hunk;
pub mod patch;
pub mod protocol;
pub mod state;
pub mod types;
pub mod usage;
pub(crate) mod xml;
