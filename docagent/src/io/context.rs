//! Cancellation and deadline context threaded through a task loop.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Reasons the caller's context stopped a loop. Both are hard failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoopError {
    #[error("task cancelled")]
    Cancelled,
    #[error("task deadline exceeded")]
    DeadlineExceeded,
}

/// Caller-owned cancellation token plus an optional deadline.
///
/// The loop has no wall-clock timeout of its own; a deadline only exists when
/// the caller sets one.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Context sharing the deadline whose token is cancelled with this one.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the context is already done.
    pub fn check(&self) -> Result<(), LoopError> {
        if self.cancel.is_cancelled() {
            return Err(LoopError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(LoopError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Await `fut` unless the context is cancelled or its deadline passes first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(LoopError::Cancelled.into()),
            () = deadline => Err(LoopError::DeadlineExceeded.into()),
            result = fut => result,
        }
    }
}
