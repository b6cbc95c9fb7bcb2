//! Task runner port and the one-shot completion listener it reports to.

use super::{BackgroundExecutorError, PersistentTaskExecutor};
use crate::persistent::domain::{AllocatedTask, TaskFailure, TaskFailureKind, TaskRequest};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Result type for task runner operations.
pub type TaskRunnerResult<T> = Result<T, TaskRunnerError>;

/// Invokes business logic for a freshly started allocation.
pub trait TaskRunner: Send + Sync {
    /// Starts `executor` for `task` without waiting for it to finish.
    ///
    /// The runner must complete `listener` once the business logic returns.
    /// When this call fails the caller completes the listener itself.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRunnerError`] when the business logic could not be
    /// handed off.
    fn execute(
        &self,
        request: TaskRequest,
        task: Arc<AllocatedTask>,
        executor: Arc<dyn PersistentTaskExecutor>,
        listener: CompletionListener,
    ) -> TaskRunnerResult<()>;
}

/// Errors returned by task runner adapters.
#[derive(Debug, Clone, Error)]
pub enum TaskRunnerError {
    /// The background executor refused the job.
    #[error(transparent)]
    Rejected(#[from] BackgroundExecutorError),

    /// Generic runner failure.
    #[error("task runner error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRunnerError {
    /// Wraps a runner failure.
    #[must_use]
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}

/// Receives the outcome of a task's business logic.
pub trait CompletionHandler: Send + Sync {
    /// Handles the single outcome of `task`.
    fn on_completion(&self, task: &Arc<AllocatedTask>, outcome: Result<(), TaskFailure>);
}

/// One-shot completion channel for a single allocated task.
///
/// Clones share the same slot: whichever clone completes first delivers the
/// outcome and every later attempt is dropped with a warning. When the last
/// clone is dropped without completing, a [`TaskFailureKind::Rejected`]
/// failure is delivered instead.
#[derive(Clone)]
pub struct CompletionListener {
    inner: Arc<ListenerInner>,
}

struct ListenerInner {
    task: Arc<AllocatedTask>,
    handler: Arc<dyn CompletionHandler>,
    fired: AtomicBool,
}

impl CompletionListener {
    /// Creates a listener that forwards the outcome of `task` to `handler`.
    #[must_use]
    pub fn new(task: Arc<AllocatedTask>, handler: Arc<dyn CompletionHandler>) -> Self {
        Self {
            inner: Arc::new(ListenerInner {
                task,
                handler,
                fired: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the task this listener belongs to.
    #[must_use]
    pub fn task(&self) -> &Arc<AllocatedTask> {
        &self.inner.task
    }

    /// Returns whether an outcome has already been delivered.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Delivers the outcome. Returns `false` if one was already delivered.
    #[must_use]
    pub fn complete(&self, outcome: Result<(), TaskFailure>) -> bool {
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                task = %self.inner.task.key(),
                ?outcome,
                "dropping duplicate completion"
            );
            return false;
        }
        self.inner.handler.on_completion(&self.inner.task, outcome);
        true
    }

    /// Delivers a successful outcome.
    #[must_use]
    pub fn on_response(&self) -> bool {
        self.complete(Ok(()))
    }

    /// Delivers a failed outcome.
    #[must_use]
    pub fn on_failure(&self, failure: TaskFailure) -> bool {
        self.complete(Err(failure))
    }
}

impl Drop for ListenerInner {
    fn drop(&mut self) {
        if *self.fired.get_mut() {
            return;
        }
        *self.fired.get_mut() = true;
        tracing::warn!(task = %self.task.key(), "task was dropped before reporting an outcome");
        let failure = TaskFailure::new(
            TaskFailureKind::Rejected,
            "task was dropped before reporting an outcome",
        );
        self.handler.on_completion(&self.task, Err(failure));
    }
}

impl fmt::Debug for CompletionListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionListener")
            .field("task", &self.inner.task.key())
            .field("fired", &self.has_fired())
            .finish_non_exhaustive()
    }
}
