//! Owned Background Tasks
//!
//! A spawned task paired with the token that stops it. Owners cancel and
//! join the task instead of dropping the handle, so nothing outlives the
//! component that started it.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How a background task finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Stopped by its cancellation token; the expected shutdown path
    Cancelled,
    /// Stopped on its own, e.g. the connection it fed went away
    Finished,
    /// Panicked or was aborted
    Failed(String),
}

impl TaskOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled)
    }
}

/// A spawned task with its cancellation token
pub struct BackgroundTask {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<TaskOutcome>,
}

impl BackgroundTask {
    /// Spawn `make(token)` onto the runtime
    ///
    /// The future receives a child of `parent`, so cancelling the parent
    /// stops the task too.
    pub fn spawn<F, Fut>(name: &'static str, parent: &CancellationToken, make: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = TaskOutcome> + Send + 'static,
    {
        let token = parent.child_token();
        let handle = tokio::spawn(make(token.clone()));
        Self {
            name,
            token,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request cancellation and wait for the task to confirm it stopped
    pub async fn shutdown(self) -> TaskOutcome {
        self.token.cancel();
        self.join().await
    }

    /// Like `shutdown`, but abort the task if it does not stop within `grace`
    pub async fn shutdown_within(self, grace: Duration) -> TaskOutcome {
        self.token.cancel();
        let name = self.name;
        let mut handle = self.handle;
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(joined) => outcome_of(name, joined),
            Err(_) => {
                tracing::warn!(task = name, "Task ignored cancellation, aborting");
                handle.abort();
                outcome_of(name, handle.await)
            }
        }
    }

    /// Wait for the task without cancelling it
    pub async fn join(self) -> TaskOutcome {
        let name = self.name;
        outcome_of(name, self.handle.await)
    }
}

fn outcome_of(
    name: &'static str,
    joined: Result<TaskOutcome, tokio::task::JoinError>,
) -> TaskOutcome {
    match joined {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(task = name, error = %e, "Background task failed");
            TaskOutcome::Failed(e.to_string())
        }
    }
}
