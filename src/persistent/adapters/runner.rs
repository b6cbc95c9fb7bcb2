//! Task runner that executes business logic on the background executor.

use crate::persistent::{
    domain::{AllocatedTask, TaskFailure, TaskFailureKind, TaskRequest},
    ports::{
        BackgroundExecutor, CompletionListener, PersistentTaskExecutor, TaskRunner,
        TaskRunnerResult,
    },
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Runs each allocation as one background job and completes its listener
/// with the outcome.
///
/// A panic in the business logic is reported as a
/// [`TaskFailureKind::Panicked`] failure.
#[derive(Clone)]
pub struct NodeTaskRunner {
    background: Arc<dyn BackgroundExecutor>,
}

impl NodeTaskRunner {
    /// Creates a runner submitting to `background`.
    #[must_use]
    pub const fn new(background: Arc<dyn BackgroundExecutor>) -> Self {
        Self { background }
    }
}

impl TaskRunner for NodeTaskRunner {
    fn execute(
        &self,
        request: TaskRequest,
        task: Arc<AllocatedTask>,
        executor: Arc<dyn PersistentTaskExecutor>,
        listener: CompletionListener,
    ) -> TaskRunnerResult<()> {
        let job = Box::pin(async move {
            tracing::trace!(task = %task.key(), task_name = executor.task_name(), "running persistent task");
            let outcome = AssertUnwindSafe(executor.node_operation(Arc::clone(&task), request))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(TaskFailure::new(
                        TaskFailureKind::Panicked,
                        panic_message(payload.as_ref()),
                    ))
                });
            if !listener.complete(outcome) {
                tracing::debug!(task = %task.key(), "outcome was already reported");
            }
        });
        self.background.submit(job)?;
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_owned())
}
