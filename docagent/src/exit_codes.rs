//! Stable exit codes for `docagent` commands.

/// Command succeeded; for `replay`, the model completed the task.
pub const OK: i32 = 0;
/// Invalid input, configuration or any other failure.
pub const INVALID: i32 = 1;
/// `docagent replay` ran out of steps before the model completed.
pub const BUDGET_EXHAUSTED: i32 = 2;
/// `docagent apply` rejected at least one file of the diff.
pub const REJECTED: i32 = 3;
